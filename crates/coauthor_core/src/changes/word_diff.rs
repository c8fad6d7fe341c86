//! Word-level diff between two texts.
//!
//! Tokens are alternating word and whitespace runs, so hunks land on word
//! boundaries and stay reviewable. Common prefix and suffix are trimmed
//! before running an LCS pass over the middle, keeping the table small for
//! the typical localized edit.

/// Kind of a diff hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum HunkKind {
    Unchanged,
    Added,
    Removed,
}

/// A contiguous run of equal-kind tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    /// Unchanged, added, or removed
    pub kind: HunkKind,
    /// The hunk's text, whitespace included
    pub text: String,
}

impl DiffHunk {
    fn new(kind: HunkKind, text: String) -> Self {
        Self { kind, text }
    }
}

/// Split text into word and whitespace tokens. Concatenating the tokens
/// reproduces the input exactly.
fn split_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;

    for (i, ch) in text.char_indices() {
        let is_space = ch.is_whitespace();
        match in_space {
            Some(prev) if prev == is_space => {}
            Some(_) => {
                tokens.push(&text[start..i]);
                start = i;
                in_space = Some(is_space);
            }
            None => in_space = Some(is_space),
        }
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

/// Compute an ordered hunk sequence turning `old` into `new`.
///
/// Within a replaced region the added hunk precedes the removed hunk, so a
/// position cursor walking the result anchors both at the same spot.
pub fn diff_words(old: &str, new: &str) -> Vec<DiffHunk> {
    if old == new {
        if old.is_empty() {
            return Vec::new();
        }
        return vec![DiffHunk::new(HunkKind::Unchanged, old.to_string())];
    }

    let old_tokens = split_tokens(old);
    let new_tokens = split_tokens(new);

    // Common prefix.
    let prefix = old_tokens
        .iter()
        .zip(new_tokens.iter())
        .take_while(|(a, b)| a == b)
        .count();

    // Common suffix, not overlapping the prefix.
    let max_suffix = old_tokens.len().min(new_tokens.len()) - prefix;
    let suffix = old_tokens[prefix..]
        .iter()
        .rev()
        .zip(new_tokens[prefix..].iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let old_mid = &old_tokens[prefix..old_tokens.len() - suffix];
    let new_mid = &new_tokens[prefix..new_tokens.len() - suffix];

    let mut hunks = Vec::new();
    if prefix > 0 {
        hunks.push(DiffHunk::new(HunkKind::Unchanged, old_tokens[..prefix].concat()));
    }
    middle_hunks(old_mid, new_mid, &mut hunks);
    if suffix > 0 {
        hunks.push(DiffHunk::new(
            HunkKind::Unchanged,
            old_tokens[old_tokens.len() - suffix..].concat(),
        ));
    }
    merge_adjacent(hunks)
}

/// LCS walk over the trimmed middle, emitting per-token ops.
fn middle_hunks(old: &[&str], new: &[&str], hunks: &mut Vec<DiffHunk>) {
    if old.is_empty() && new.is_empty() {
        return;
    }
    if old.is_empty() {
        hunks.push(DiffHunk::new(HunkKind::Added, new.concat()));
        return;
    }
    if new.is_empty() {
        hunks.push(DiffHunk::new(HunkKind::Removed, old.concat()));
        return;
    }

    // lcs[i][j] = LCS length of old[i..] vs new[j..]
    let n = old.len();
    let m = new.len();
    let mut lcs = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    let mut pending_removed = String::new();
    let mut pending_added = String::new();
    while i < n || j < m {
        if i < n && j < m && old[i] == new[j] {
            flush_pending(hunks, &mut pending_added, &mut pending_removed);
            // Extend the unchanged run.
            match hunks.last_mut() {
                Some(hunk) if hunk.kind == HunkKind::Unchanged => hunk.text.push_str(old[i]),
                _ => hunks.push(DiffHunk::new(HunkKind::Unchanged, old[i].to_string())),
            }
            i += 1;
            j += 1;
        } else if j < m && (i == n || lcs[i][j + 1] >= lcs[i + 1][j]) {
            pending_added.push_str(new[j]);
            j += 1;
        } else {
            pending_removed.push_str(old[i]);
            i += 1;
        }
    }
    flush_pending(hunks, &mut pending_added, &mut pending_removed);
}

/// Added before removed: both anchor at the same original position.
fn flush_pending(hunks: &mut Vec<DiffHunk>, added: &mut String, removed: &mut String) {
    if !added.is_empty() {
        hunks.push(DiffHunk::new(HunkKind::Added, std::mem::take(added)));
    }
    if !removed.is_empty() {
        hunks.push(DiffHunk::new(HunkKind::Removed, std::mem::take(removed)));
    }
}

fn merge_adjacent(hunks: Vec<DiffHunk>) -> Vec<DiffHunk> {
    let mut merged: Vec<DiffHunk> = Vec::with_capacity(hunks.len());
    for hunk in hunks {
        match merged.last_mut() {
            Some(last) if last.kind == hunk.kind => last.text.push_str(&hunk.text),
            _ => merged.push(hunk),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(hunks: &[DiffHunk]) -> Vec<HunkKind> {
        hunks.iter().map(|h| h.kind).collect()
    }

    #[test]
    fn test_equal_texts_single_unchanged_hunk() {
        let hunks = diff_words("same text", "same text");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].kind, HunkKind::Unchanged);
    }

    #[test]
    fn test_tokens_reassemble_input() {
        let text = "one  two\nthree\t four ";
        assert_eq!(split_tokens(text).concat(), text);
    }

    #[test]
    fn test_pure_insertion() {
        let hunks = diff_words("a c", "a b c");
        assert_eq!(
            kinds(&hunks),
            vec![HunkKind::Unchanged, HunkKind::Added, HunkKind::Unchanged]
        );
        assert_eq!(hunks[1].text, "b ");
    }

    #[test]
    fn test_pure_removal() {
        let hunks = diff_words("a b c", "a c");
        let removed: String = hunks
            .iter()
            .filter(|h| h.kind == HunkKind::Removed)
            .map(|h| h.text.clone())
            .collect();
        assert_eq!(removed.trim(), "b");
    }

    #[test]
    fn test_replacement_emits_added_before_removed() {
        let hunks = diff_words("a\nb", "a\nc");
        assert_eq!(
            kinds(&hunks),
            vec![HunkKind::Unchanged, HunkKind::Added, HunkKind::Removed]
        );
        assert_eq!(hunks[0].text, "a\n");
        assert_eq!(hunks[1].text, "c");
        assert_eq!(hunks[2].text, "b");
    }

    #[test]
    fn test_word_granularity_not_characters() {
        let hunks = diff_words("the quick fox", "the slow fox");
        let added: Vec<&str> = hunks
            .iter()
            .filter(|h| h.kind == HunkKind::Added)
            .map(|h| h.text.as_str())
            .collect();
        assert_eq!(added, vec!["slow"]);
    }

    #[test]
    fn test_unchanged_hunks_reassemble_old_with_removed() {
        let old = "alpha beta gamma delta";
        let new = "alpha gamma epsilon";
        let hunks = diff_words(old, new);

        let rebuilt_old: String = hunks
            .iter()
            .filter(|h| h.kind != HunkKind::Added)
            .map(|h| h.text.clone())
            .collect();
        assert_eq!(rebuilt_old, old);

        let rebuilt_new: String = hunks
            .iter()
            .filter(|h| h.kind != HunkKind::Removed)
            .map(|h| h.text.clone())
            .collect();
        assert_eq!(rebuilt_new, new);
    }

    #[test]
    fn test_empty_sides() {
        assert!(diff_words("", "").is_empty());
        let hunks = diff_words("", "fresh text");
        assert_eq!(kinds(&hunks), vec![HunkKind::Added]);
        let hunks = diff_words("old text", "");
        assert_eq!(kinds(&hunks), vec![HunkKind::Removed]);
    }
}
