//! The replicated structural tree for one document.
//!
//! `DocTree` wraps a `yrs::Doc` holding two named roots:
//!
//! - an XML fragment (`"content"`) of block elements with formatted text runs,
//! - an array (`"changes"`) mirroring the suggested-change log into CRDT space
//!   so review clients converge on it alongside the text.
//!
//! All mutation primitives are commutative and idempotent under
//! re-application; two replicas applying the same remote update set converge
//! regardless of arrival order. Hydrating from persisted bytes is a merge
//! (the bytes carry causal history). A freshly imported tree is NOT: it must
//! replace the persisted state wholesale, followed by eviction of live
//! replicas, never delta-merged into them.

use std::collections::HashSet;

use yrs::{
    Array, ArrayRef, Doc, ReadTxn, StateVector, Text, Transact, Update, Xml, XmlElementPrelim,
    XmlFragment, XmlFragmentRef, XmlOut, XmlTextPrelim, XmlTextRef, updates::decoder::Decode,
    updates::encoder::Encode,
};

use super::schema::{BlockKind, BlockTag, LEVEL_ATTR, Mark, marks_to_attrs};
use crate::changes::ChangeRecord;
use crate::error::{EngineError, Result};
use crate::html;

/// Name of the XML fragment holding the document content.
pub const CONTENT_FRAGMENT_NAME: &str = "content";

/// Name of the array holding the suggested-change log.
pub const CHANGES_ARRAY_NAME: &str = "changes";

/// A CRDT-backed structural tree for a single document.
pub struct DocTree {
    doc: Doc,
    content: XmlFragmentRef,
    change_log: ArrayRef,
}

impl DocTree {
    /// Create a new empty tree.
    pub fn new() -> Self {
        let doc = Doc::new();
        let content = doc.get_or_insert_xml_fragment(CONTENT_FRAGMENT_NAME);
        let change_log = doc.get_or_insert_array(CHANGES_ARRAY_NAME);
        Self {
            doc,
            content,
            change_log,
        }
    }

    /// Hydrate a tree from persisted bytes.
    ///
    /// The bytes were produced by [`DocTree::encode`] on a previous replica,
    /// so applying them onto a fresh document is a legitimate merge.
    pub fn hydrate(state: &[u8]) -> Result<Self> {
        let tree = Self::new();
        let update = Update::decode_v1(state)
            .map_err(|e| EngineError::Crdt(format!("Failed to decode persisted state: {}", e)))?;
        {
            let mut txn = tree.doc.transact_mut();
            txn.apply_update(update)
                .map_err(|e| EngineError::Crdt(format!("Failed to apply persisted state: {}", e)))?;
        }
        Ok(tree)
    }

    // ==================== Sync Operations ====================

    /// Encode the full state as an update.
    pub fn encode(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Encode the current state vector for sync.
    pub fn state_vector(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.state_vector().encode_v1()
    }

    /// Encode the diff between current state and a remote state vector.
    pub fn encode_diff(&self, remote_state_vector: &[u8]) -> Result<Vec<u8>> {
        let sv = StateVector::decode_v1(remote_state_vector)
            .map_err(|e| EngineError::Crdt(format!("Failed to decode state vector: {}", e)))?;
        let txn = self.doc.transact();
        Ok(txn.encode_state_as_update_v1(&sv))
    }

    /// Apply an update from a remote peer.
    ///
    /// Updates are monotonic merges: a delta referencing unseen state is
    /// integrated when its dependencies arrive, never applied as an overwrite.
    pub fn apply_update(&self, update: &[u8]) -> Result<()> {
        let decoded = Update::decode_v1(update)
            .map_err(|e| EngineError::Crdt(format!("Failed to decode update: {}", e)))?;
        let mut txn = self.doc.transact_mut();
        txn.apply_update(decoded)
            .map_err(|e| EngineError::Crdt(format!("Failed to apply update: {}", e)))?;
        Ok(())
    }

    /// Observe update deltas produced by local mutations, for broadcast to
    /// other replicas over the host's channel.
    pub fn observe_updates<F>(&self, callback: F) -> yrs::Subscription
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.doc
            .observe_update_v1(move |_, event| {
                callback(&event.update);
            })
            .expect("Failed to observe document updates")
    }

    // ==================== Content Mutations ====================

    /// Insert text into the text run of the block at `block_index`.
    pub fn insert_text(&self, block_index: u32, index: u32, chunk: &str) -> Result<()> {
        let mut txn = self.doc.transact_mut();
        let text = self
            .leaf_text(&txn, block_index)
            .ok_or_else(|| no_text_run(block_index))?;
        text.insert(&mut txn, index, chunk);
        Ok(())
    }

    /// Delete a range from the text run of the block at `block_index`.
    pub fn delete_range(&self, block_index: u32, index: u32, len: u32) -> Result<()> {
        let mut txn = self.doc.transact_mut();
        let text = self
            .leaf_text(&txn, block_index)
            .ok_or_else(|| no_text_run(block_index))?;
        text.remove_range(&mut txn, index, len);
        Ok(())
    }

    /// Apply a mark over a sub-range of the block's text run.
    pub fn format(&self, block_index: u32, index: u32, len: u32, mark: &Mark) -> Result<()> {
        let mut txn = self.doc.transact_mut();
        let text = self
            .leaf_text(&txn, block_index)
            .ok_or_else(|| no_text_run(block_index))?;
        text.format(&mut txn, index, len, marks_to_attrs(std::slice::from_ref(mark)));
        Ok(())
    }

    /// Insert a new block element at the given child index of the root.
    ///
    /// Leaf blocks receive a text run holding `text`; other kinds ignore it.
    pub fn insert_block(
        &self,
        index: u32,
        tag: &BlockTag,
        attrs: &[(String, String)],
        text: &str,
    ) -> Result<()> {
        let mut txn = self.doc.transact_mut();
        let element = self
            .content
            .insert(&mut txn, index, XmlElementPrelim::empty(tag.node_name().to_string()));
        if let BlockTag::Heading(level) = tag {
            element.insert_attribute(&mut txn, LEVEL_ATTR, level.to_string());
        }
        for (key, value) in attrs {
            element.insert_attribute(&mut txn, key.as_str(), value.as_str());
        }
        if tag.kind() == BlockKind::Leaf {
            element.insert(&mut txn, 0, XmlTextPrelim::new(text));
        }
        Ok(())
    }

    /// Number of top-level blocks.
    pub fn block_count(&self) -> u32 {
        let txn = self.doc.transact();
        self.content.len(&txn)
    }

    /// Plain text of the block at `block_index`, if it holds a text run.
    /// Format attributes are ignored.
    pub fn block_text(&self, block_index: u32) -> Option<String> {
        let txn = self.doc.transact();
        let text = self.leaf_text(&txn, block_index)?;
        Some(html::text_run_string(&txn, &text))
    }

    fn leaf_text<T: ReadTxn>(&self, txn: &T, block_index: u32) -> Option<XmlTextRef> {
        match self.content.get(txn, block_index)? {
            XmlOut::Element(element) => {
                for i in 0..element.len(txn) {
                    if let Some(XmlOut::Text(text)) = element.get(txn, i) {
                        return Some(text);
                    }
                }
                None
            }
            XmlOut::Text(text) => Some(text),
            _ => None,
        }
    }

    // ==================== Change Log ====================

    /// Append a batch of change records in a single transaction.
    ///
    /// Array appends commute with concurrent appends from other replicas;
    /// prior entries are never overwritten.
    pub fn append_changes(&self, records: &[ChangeRecord]) -> Result<()> {
        let mut txn = self.doc.transact_mut();
        for record in records {
            let json = serde_json::to_string(record)
                .map_err(|e| EngineError::Crdt(format!("Failed to encode change record: {}", e)))?;
            self.change_log.push_back(&mut txn, json);
        }
        Ok(())
    }

    /// Decode the change log, skipping malformed entries.
    pub fn changes(&self) -> Vec<ChangeRecord> {
        let txn = self.doc.transact();
        let mut out = Vec::new();
        for i in 0..self.change_log.len(&txn) {
            if let Some(value) = self.change_log.get(&txn, i) {
                let json = value.to_string(&txn);
                match serde_json::from_str::<ChangeRecord>(&json) {
                    Ok(record) => out.push(record),
                    Err(e) => log::warn!("Skipping malformed change record: {}", e),
                }
            }
        }
        out
    }

    /// Replay persisted change records into the CRDT array, skipping any id
    /// already present. Safe to call on every load.
    pub fn replay_changes(&self, records: &[ChangeRecord]) -> Result<()> {
        let existing: HashSet<uuid::Uuid> = self.changes().iter().map(|r| r.id).collect();
        let missing: Vec<ChangeRecord> = records
            .iter()
            .filter(|r| !existing.contains(&r.id))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        self.append_changes(&missing)
    }

    // ==================== Conversion ====================

    /// Replace the content fragment with the result of importing `markup`.
    ///
    /// Only valid on a tree whose encoding will be persisted as the
    /// document's sole source of truth; see the module docs.
    pub fn import_html(&self, markup: &str) {
        let mut txn = self.doc.transact_mut();
        let len = self.content.len(&txn);
        if len > 0 {
            self.content.remove_range(&mut txn, 0, len);
        }
        html::import_into(&mut txn, &self.content, markup);
    }

    /// Serialize the content fragment to markup.
    pub fn export_html(&self) -> String {
        let txn = self.doc.transact();
        html::export_fragment(&txn, &self.content)
    }

    /// Render the content fragment to the plain text used as the diff
    /// baseline for suggested changes.
    pub fn export_text(&self) -> String {
        let txn = self.doc.transact();
        html::export_plain_text(&txn, &self.content)
    }

    /// Access the content fragment together with a write transaction.
    pub fn with_content_mut<R>(&self, f: impl FnOnce(&mut yrs::TransactionMut, &XmlFragmentRef) -> R) -> R {
        let mut txn = self.doc.transact_mut();
        f(&mut txn, &self.content)
    }
}

impl Default for DocTree {
    fn default() -> Self {
        Self::new()
    }
}

fn no_text_run(block_index: u32) -> EngineError {
    EngineError::InvalidInput(format!("block {} has no text run", block_index))
}

impl std::fmt::Debug for DocTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocTree")
            .field("blocks", &self.block_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{Author, ChangeKind, Position};

    fn paragraph_tree(text: &str) -> DocTree {
        let tree = DocTree::new();
        tree.insert_block(0, &BlockTag::Paragraph, &[], text).unwrap();
        tree
    }

    fn sync_record(content: &str) -> ChangeRecord {
        ChangeRecord {
            id: uuid::Uuid::new_v4(),
            kind: ChangeKind::Insert,
            anchor: Position::default(),
            content: Some(content.to_string()),
            old_content: None,
            author: Author::sync("test"),
            timestamp: 0,
        }
    }

    #[test]
    fn test_new_tree_is_empty() {
        let tree = DocTree::new();
        assert_eq!(tree.block_count(), 0);
        assert!(tree.changes().is_empty());
    }

    #[test]
    fn test_insert_and_read_block_text() {
        let tree = paragraph_tree("Hello World");
        assert_eq!(tree.block_count(), 1);
        assert_eq!(tree.block_text(0), Some("Hello World".to_string()));
    }

    #[test]
    fn test_insert_text_and_delete_range() {
        let tree = paragraph_tree("Hello World");
        tree.insert_text(0, 6, "Beautiful ").unwrap();
        assert_eq!(tree.block_text(0), Some("Hello Beautiful World".to_string()));

        tree.delete_range(0, 6, 10).unwrap();
        assert_eq!(tree.block_text(0), Some("Hello World".to_string()));
    }

    #[test]
    fn test_mutation_on_missing_block_is_invalid_input() {
        let tree = DocTree::new();
        let err = tree.insert_text(3, 0, "x").unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_encode_hydrate_round_trip() {
        let tree = paragraph_tree("Persistent content");
        let state = tree.encode();

        let reloaded = DocTree::hydrate(&state).unwrap();
        assert_eq!(reloaded.block_count(), 1);
        assert_eq!(reloaded.block_text(0), Some("Persistent content".to_string()));
    }

    #[test]
    fn test_hydrate_rejects_garbage() {
        let err = DocTree::hydrate(&[0xFF, 0x00, 0x13, 0x37]).unwrap_err();
        assert!(matches!(err, EngineError::Crdt(_)));
    }

    #[test]
    fn test_concurrent_edits_converge() {
        let tree1 = paragraph_tree("Hello World");
        let tree2 = DocTree::hydrate(&tree1.encode()).unwrap();

        tree1.insert_text(0, 0, "A: ").unwrap();
        tree2.insert_text(0, 11, "!").unwrap();

        let update1 = tree1.encode();
        let update2 = tree2.encode();
        tree1.apply_update(&update2).unwrap();
        tree2.apply_update(&update1).unwrap();

        assert_eq!(tree1.block_text(0), tree2.block_text(0));
        let body = tree1.block_text(0).unwrap();
        assert!(body.contains("A: "));
        assert!(body.contains('!'));
    }

    #[test]
    fn test_reapplying_update_is_idempotent() {
        let tree1 = paragraph_tree("stable");
        let tree2 = DocTree::new();

        let update = tree1.encode();
        tree2.apply_update(&update).unwrap();
        tree2.apply_update(&update).unwrap();

        assert_eq!(tree2.block_count(), 1);
        assert_eq!(tree2.block_text(0), Some("stable".to_string()));
    }

    #[test]
    fn test_encode_diff_against_remote_state() {
        let tree1 = paragraph_tree("Initial content");
        let tree2 = DocTree::hydrate(&tree1.encode()).unwrap();

        let sv2 = tree2.state_vector();
        tree1.insert_text(0, 0, "NEW: ").unwrap();

        let diff = tree1.encode_diff(&sv2).unwrap();
        tree2.apply_update(&diff).unwrap();

        assert_eq!(tree2.block_text(0), Some("NEW: Initial content".to_string()));
    }

    #[test]
    fn test_change_log_append_and_read() {
        let tree = DocTree::new();
        let records = vec![sync_record("one"), sync_record("two")];
        tree.append_changes(&records).unwrap();

        let read = tree.changes();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].content.as_deref(), Some("one"));
        assert_eq!(read[1].content.as_deref(), Some("two"));
    }

    #[test]
    fn test_replay_changes_is_idempotent() {
        let tree = DocTree::new();
        let records = vec![sync_record("a"), sync_record("b")];
        tree.append_changes(&records).unwrap();

        tree.replay_changes(&records).unwrap();
        assert_eq!(tree.changes().len(), 2);

        let extra = sync_record("c");
        let mut with_extra = records.clone();
        with_extra.push(extra);
        tree.replay_changes(&with_extra).unwrap();
        assert_eq!(tree.changes().len(), 3);
    }

    #[test]
    fn test_change_log_survives_encode_cycle() {
        let tree = DocTree::new();
        tree.append_changes(&[sync_record("persisted")]).unwrap();

        let reloaded = DocTree::hydrate(&tree.encode()).unwrap();
        let changes = reloaded.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].content.as_deref(), Some("persisted"));
    }

    #[test]
    fn test_observer_fires_on_mutation() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let tree = paragraph_tree("watch me");
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = Arc::clone(&fired);

        let _sub = tree.observe_updates(move |_update| {
            fired_clone.store(true, Ordering::SeqCst);
        });

        tree.insert_text(0, 0, "x").unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }
}
