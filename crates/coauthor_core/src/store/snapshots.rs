//! Version snapshot lifecycle: throttle and retention.
//!
//! Snapshots are taken unconditionally before destructive transitions
//! (overwrite, restore) and at most once per interval on ordinary store
//! events. Retention is FIFO: oldest pruned first once the bound is hit.

use std::sync::Arc;

use crate::config::EngineConfig;

use super::storage::{DocumentStore, StoreResult};
use super::types::{VersionInfo, VersionSnapshot};

/// Throttle and retention knobs.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotPolicy {
    /// Minimum age of the newest snapshot before a throttled one is taken.
    pub interval_ms: i64,

    /// Retention bound per document.
    pub max_snapshots: usize,
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl SnapshotPolicy {
    /// Derive the policy from an engine config.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            interval_ms: config.snapshot_interval_ms(),
            max_snapshots: config.max_snapshots,
        }
    }
}

/// Manager for the per-document snapshot collections.
pub struct SnapshotManager {
    store: Arc<dyn DocumentStore>,
    policy: SnapshotPolicy,
}

impl SnapshotManager {
    /// Create a manager over the given store.
    pub fn new(store: Arc<dyn DocumentStore>, policy: SnapshotPolicy) -> Self {
        Self { store, policy }
    }

    /// Take a snapshot if the newest one is older than the interval.
    ///
    /// Returns the new snapshot id, or `None` when throttled or when there is
    /// no state to snapshot yet.
    pub fn maybe_snapshot(
        &self,
        document_id: &str,
        state: &[u8],
        now_ms: i64,
    ) -> StoreResult<Option<i64>> {
        if state.is_empty() {
            return Ok(None);
        }
        if let Some(latest) = self.store.latest_snapshot(document_id)?
            && now_ms - latest.created_at < self.policy.interval_ms
        {
            return Ok(None);
        }
        self.take(document_id, state, now_ms).map(Some)
    }

    /// Take a snapshot unconditionally (pre-overwrite, pre-restore).
    pub fn force_snapshot(&self, document_id: &str, state: &[u8], now_ms: i64) -> StoreResult<i64> {
        self.take(document_id, state, now_ms)
    }

    /// List a document's snapshots, oldest first.
    pub fn list(&self, document_id: &str) -> StoreResult<Vec<VersionInfo>> {
        self.store.list_snapshots(document_id)
    }

    fn take(&self, document_id: &str, state: &[u8], now_ms: i64) -> StoreResult<i64> {
        // Ids are timestamp-derived but must stay monotonic, so a same-
        // millisecond snapshot bumps past the newest id.
        let last_id = self
            .store
            .latest_snapshot(document_id)?
            .map(|s| s.id)
            .unwrap_or(0);
        let id = now_ms.max(last_id + 1);

        self.store.insert_snapshot(
            document_id,
            &VersionSnapshot {
                id,
                created_at: now_ms,
                state: state.to_vec(),
            },
        )?;

        // Prune failures must not block the store event that triggered them.
        if let Err(e) = self
            .store
            .prune_snapshots(document_id, self.policy.max_snapshots)
        {
            log::warn!("Snapshot prune failed for '{}': {}", document_id, e);
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const MINUTE_MS: i64 = 60_000;

    fn manager(max_snapshots: usize) -> SnapshotManager {
        SnapshotManager::new(
            Arc::new(MemoryStore::new()),
            SnapshotPolicy {
                interval_ms: 5 * MINUTE_MS,
                max_snapshots,
            },
        )
    }

    #[test]
    fn test_first_store_event_snapshots() {
        let manager = manager(50);
        let id = manager.maybe_snapshot("doc", b"state", 1_000).unwrap();
        assert!(id.is_some());
        assert_eq!(manager.list("doc").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_state_never_snapshots() {
        let manager = manager(50);
        assert!(manager.maybe_snapshot("doc", b"", 1_000).unwrap().is_none());
    }

    #[test]
    fn test_throttle_two_stores_thirty_seconds_apart() {
        let manager = manager(50);
        let start = 1_000_000;
        assert!(manager.maybe_snapshot("doc", b"v1", start).unwrap().is_some());
        assert!(
            manager
                .maybe_snapshot("doc", b"v2", start + 30_000)
                .unwrap()
                .is_none()
        );
        assert_eq!(manager.list("doc").unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_after_interval_elapses() {
        let manager = manager(50);
        let start = 1_000_000;
        manager.maybe_snapshot("doc", b"v1", start).unwrap();
        let second = manager
            .maybe_snapshot("doc", b"v2", start + 5 * MINUTE_MS + 1)
            .unwrap();
        assert!(second.is_some());
        assert_eq!(manager.list("doc").unwrap().len(), 2);
    }

    #[test]
    fn test_force_ignores_throttle() {
        let manager = manager(50);
        manager.maybe_snapshot("doc", b"v1", 1_000).unwrap();
        manager.force_snapshot("doc", b"v2", 1_001).unwrap();
        assert_eq!(manager.list("doc").unwrap().len(), 2);
    }

    #[test]
    fn test_retention_sixty_triggers_keep_newest_fifty() {
        let manager = manager(50);
        let start = 10 * MINUTE_MS;
        for i in 0..60 {
            let now = start + i * 6 * MINUTE_MS;
            let taken = manager.maybe_snapshot("doc", b"state", now).unwrap();
            assert!(taken.is_some(), "trigger {} was throttled", i);
        }

        let remaining = manager.list("doc").unwrap();
        assert_eq!(remaining.len(), 50);
        // The oldest ten are gone; the newest fifty remain in order.
        let expected_oldest = start + 10 * 6 * MINUTE_MS;
        assert_eq!(remaining[0].created_at, expected_oldest);
        assert_eq!(
            remaining.last().unwrap().created_at,
            start + 59 * 6 * MINUTE_MS
        );
    }

    #[test]
    fn test_same_millisecond_ids_stay_monotonic() {
        let manager = manager(50);
        let first = manager.force_snapshot("doc", b"a", 5_000).unwrap();
        let second = manager.force_snapshot("doc", b"b", 5_000).unwrap();
        assert!(second > first);
    }
}
