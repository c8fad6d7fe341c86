//! Markup importer: builds structural tree nodes from a token stream.
//!
//! Recursive descent over the token slice. Matching close tags are found with
//! a depth counter so nested same-name tags are never assumed flat. Inline
//! formatting is flattened into a mark stack threaded through recursion as an
//! explicit parameter, so `<strong><em>x</em></strong>` yields one text chunk
//! carrying both marks regardless of nesting order.

use indexmap::IndexMap;
use yrs::{TransactionMut, Xml, XmlElementPrelim, XmlElementRef, XmlFragment, XmlTextPrelim, XmlTextRef, Text};

use super::tokens::{Token, tokenize};
use crate::doc::{BlockKind, BlockTag, LEVEL_ATTR, Mark, TagClass, classify_markup, marks_to_attrs};

/// Populate `fragment` from a markup string.
pub fn import_into<F: XmlFragment>(txn: &mut TransactionMut, fragment: &F, markup: &str) {
    let tokens = tokenize(markup);
    import_children(txn, fragment, &tokens);
}

/// Import a token slice as block-level children of `parent`.
fn import_children<F: XmlFragment>(txn: &mut TransactionMut, parent: &F, tokens: &[Token]) {
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Text(text) => {
                if text.trim().is_empty() {
                    i += 1;
                    continue;
                }
                // Bare inline content at block level gets an implicit paragraph.
                let end = inline_run_end(tokens, i);
                import_implicit_paragraph(txn, parent, &tokens[i..end]);
                i = end;
            }
            Token::Open { tag, attrs } => {
                let close = matching_close(tokens, i + 1, tag);
                let inner = &tokens[i + 1..close];
                match classify_markup(tag) {
                    TagClass::Transparent => {
                        // thead/tbody wrappers splice their children into the parent.
                        import_children(txn, parent, inner);
                    }
                    TagClass::Inline => {
                        let end = inline_run_end(tokens, i);
                        import_implicit_paragraph(txn, parent, &tokens[i..end]);
                        i = end;
                        continue;
                    }
                    TagClass::Block(block_tag) => {
                        import_block(txn, parent, &block_tag, attrs, inner);
                    }
                }
                i = (close + 1).min(tokens.len());
            }
            Token::SelfClose { tag, attrs } => {
                if let TagClass::Block(block_tag) = classify_markup(tag) {
                    create_element(txn, parent, &block_tag, attrs);
                }
                i += 1;
            }
            // Stray close tag; nothing to match, skip it.
            Token::Close { .. } => i += 1,
        }
    }
}

fn import_block<F: XmlFragment>(
    txn: &mut TransactionMut,
    parent: &F,
    tag: &BlockTag,
    attrs: &IndexMap<String, String>,
    inner: &[Token],
) {
    match tag.kind() {
        BlockKind::Leaf => {
            let element = create_element(txn, parent, tag, attrs);
            let text = element.push_back(txn, XmlTextPrelim::new(""));
            let mut marks = Vec::new();
            extract_inline(txn, &text, inner, &mut marks);
        }
        BlockKind::Container => {
            let element = create_element(txn, parent, tag, attrs);
            import_children(txn, &element, inner);
        }
        BlockKind::Mixed => {
            let element = create_element(txn, parent, tag, attrs);
            if contains_block(inner) {
                import_children(txn, &element, inner);
            } else {
                import_implicit_paragraph(txn, &element, inner);
            }
        }
        BlockKind::Void => {
            create_element(txn, parent, tag, attrs);
        }
    }
}

/// Wrap inline tokens in an implicit paragraph so no text run sits directly
/// under a container block.
fn import_implicit_paragraph<F: XmlFragment>(
    txn: &mut TransactionMut,
    parent: &F,
    tokens: &[Token],
) {
    let element = create_element(txn, parent, &BlockTag::Paragraph, &IndexMap::new());
    let text = element.push_back(txn, XmlTextPrelim::new(""));
    let mut marks = Vec::new();
    extract_inline(txn, &text, tokens, &mut marks);
}

fn create_element<F: XmlFragment>(
    txn: &mut TransactionMut,
    parent: &F,
    tag: &BlockTag,
    attrs: &IndexMap<String, String>,
) -> XmlElementRef {
    let element: XmlElementRef =
        parent.push_back(txn, XmlElementPrelim::empty(tag.node_name().to_string()));
    if let BlockTag::Heading(level) = tag {
        element.insert_attribute(txn, LEVEL_ATTR, level.to_string());
    }
    for (key, value) in attrs {
        element.insert_attribute(txn, key.as_str(), value.as_str());
    }
    element
}

/// Append a token slice's text into `text`, carrying the active marks down
/// through inline nesting.
fn extract_inline(
    txn: &mut TransactionMut,
    text: &XmlTextRef,
    tokens: &[Token],
    marks: &mut Vec<Mark>,
) {
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Text(chunk) => {
                append_text(txn, text, chunk, marks);
                i += 1;
            }
            Token::Open { tag, attrs } => {
                let close = matching_close(tokens, i + 1, tag);
                let inner = &tokens[i + 1..close];
                let mark = Mark::from_markup(tag, attrs);
                if let Some(mark) = mark {
                    marks.push(mark);
                    extract_inline(txn, text, inner, marks);
                    marks.pop();
                } else {
                    // span, or a block tag nested inside a leaf: flatten.
                    extract_inline(txn, text, inner, marks);
                }
                i = (close + 1).min(tokens.len());
            }
            Token::SelfClose { tag, .. } => {
                // A break inside a leaf block is a newline in its text run.
                if tag == "br" {
                    append_text(txn, text, "\n", marks);
                }
                i += 1;
            }
            Token::Close { .. } => i += 1,
        }
    }
}

fn append_text(txn: &mut TransactionMut, text: &XmlTextRef, chunk: &str, marks: &[Mark]) {
    if chunk.is_empty() {
        return;
    }
    let index = text.len(txn);
    if marks.is_empty() {
        text.insert(txn, index, chunk);
    } else {
        text.insert_with_attributes(txn, index, chunk, marks_to_attrs(marks));
    }
}

/// Index of the close token matching an open at `start - 1`, or the slice end
/// when the document is truncated. Same-name nesting tracked by depth.
fn matching_close(tokens: &[Token], start: usize, tag: &str) -> usize {
    let mut depth = 0usize;
    for (offset, token) in tokens[start..].iter().enumerate() {
        match token {
            Token::Open { tag: t, .. } if t == tag => depth += 1,
            Token::Close { tag: t } if t == tag => {
                if depth == 0 {
                    return start + offset;
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    tokens.len()
}

/// End of a run of inline content starting at `start`: text, inline tags
/// (with their subtrees) and hard breaks, up to the next block boundary.
fn inline_run_end(tokens: &[Token], start: usize) -> usize {
    let mut i = start;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Text(_) => i += 1,
            Token::Open { tag, .. } => match classify_markup(tag) {
                TagClass::Inline => {
                    i = (matching_close(tokens, i + 1, tag) + 1).min(tokens.len());
                }
                _ => break,
            },
            Token::SelfClose { tag, .. } if tag == "br" => i += 1,
            _ => break,
        }
    }
    i
}

/// True when the slice holds any block-forcing tag at any depth. Hard breaks
/// stay inline and never force block recursion.
fn contains_block(tokens: &[Token]) -> bool {
    tokens.iter().any(|token| match token {
        Token::Open { tag, .. } => {
            matches!(classify_markup(tag), TagClass::Block(t) if t.kind() != BlockKind::Void)
        }
        Token::SelfClose { tag, .. } => matches!(
            classify_markup(tag),
            TagClass::Block(BlockTag::Image) | TagClass::Block(BlockTag::HorizontalRule)
        ),
        _ => false,
    })
}
