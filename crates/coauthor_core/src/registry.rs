//! Registry of live in-memory replicas.
//!
//! An injected arena keyed by document id, with explicit lifecycle methods.
//! Eviction exists for the one case a CRDT cannot merge: a tree with no
//! shared causal history has replaced the persisted state, so every live
//! replica must drop its in-memory tree and rehydrate from the new bytes.
//! Listeners are notified on eviction so the host can sever the document's
//! live connections at the same moment.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::doc::DocTree;
use crate::error::Result;

type EvictListener = Box<dyn Fn(&str) + Send + Sync>;

/// Arena of hydrated [`DocTree`] replicas.
pub struct ReplicaRegistry {
    replicas: RwLock<HashMap<String, Arc<DocTree>>>,
    evict_listeners: RwLock<Vec<EvictListener>>,
}

impl ReplicaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            replicas: RwLock::new(HashMap::new()),
            evict_listeners: RwLock::new(Vec::new()),
        }
    }

    /// Get a hydrated replica, if any.
    pub fn get(&self, document_id: &str) -> Option<Arc<DocTree>> {
        let replicas = self.replicas.read().unwrap();
        replicas.get(document_id).map(Arc::clone)
    }

    /// Get the replica for a document, hydrating it with `hydrate` on first
    /// access. Uses double-checked locking to prevent duplicate hydration.
    pub fn get_or_hydrate<F>(&self, document_id: &str, hydrate: F) -> Result<Arc<DocTree>>
    where
        F: FnOnce() -> Result<DocTree>,
    {
        // Fast path: check cache with read lock
        {
            let replicas = self.replicas.read().unwrap();
            if let Some(replica) = replicas.get(document_id) {
                return Ok(Arc::clone(replica));
            }
        }

        // Acquire write lock for potential insertion
        let mut replicas = self.replicas.write().unwrap();

        // Double-check: another thread may have hydrated while we waited
        if let Some(replica) = replicas.get(document_id) {
            return Ok(Arc::clone(replica));
        }

        let replica = Arc::new(hydrate()?);
        replicas.insert(document_id.to_string(), Arc::clone(&replica));
        Ok(replica)
    }

    /// Whether a replica is currently hydrated.
    pub fn is_hydrated(&self, document_id: &str) -> bool {
        let replicas = self.replicas.read().unwrap();
        replicas.contains_key(document_id)
    }

    /// Ids of all hydrated replicas.
    pub fn hydrated_ids(&self) -> Vec<String> {
        let replicas = self.replicas.read().unwrap();
        replicas.keys().cloned().collect()
    }

    /// Number of hydrated replicas.
    pub fn hydrated_count(&self) -> usize {
        let replicas = self.replicas.read().unwrap();
        replicas.len()
    }

    /// Evict a replica, notifying listeners. The next access rehydrates from
    /// persisted state.
    pub fn evict(&self, document_id: &str) -> Option<Arc<DocTree>> {
        let evicted = {
            let mut replicas = self.replicas.write().unwrap();
            replicas.remove(document_id)
        };
        if evicted.is_some() {
            self.notify_evicted(document_id);
        }
        evicted
    }

    /// Run `persist` and evict the document's replica as one unit.
    ///
    /// The registry's write lock is held across both steps, so no concurrent
    /// hydration can observe the persisted-but-not-yet-evicted window and
    /// merge against a tree that is about to be replaced.
    pub fn replace_evicting<F>(&self, document_id: &str, persist: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        {
            let mut replicas = self.replicas.write().unwrap();
            persist()?;
            replicas.remove(document_id);
        }
        self.notify_evicted(document_id);
        Ok(())
    }

    /// Evict every replica.
    pub fn evict_all(&self) {
        let ids: Vec<String> = {
            let mut replicas = self.replicas.write().unwrap();
            let ids = replicas.keys().cloned().collect();
            replicas.clear();
            ids
        };
        for id in ids {
            self.notify_evicted(&id);
        }
    }

    /// Register a listener invoked with the document id on every eviction.
    pub fn on_evict<F>(&self, listener: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let mut listeners = self.evict_listeners.write().unwrap();
        listeners.push(Box::new(listener));
    }

    fn notify_evicted(&self, document_id: &str) {
        let listeners = self.evict_listeners.read().unwrap();
        for listener in listeners.iter() {
            listener(document_id);
        }
    }
}

impl Default for ReplicaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReplicaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let replicas = self.replicas.read().unwrap();
        f.debug_struct("ReplicaRegistry")
            .field("hydrated", &replicas.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_get_or_hydrate_caches() {
        let registry = ReplicaRegistry::new();
        let calls = AtomicUsize::new(0);

        let first = registry
            .get_or_hydrate("doc", || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(DocTree::new())
            })
            .unwrap();
        let second = registry
            .get_or_hydrate("doc", || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(DocTree::new())
            })
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hydrate_error_is_not_cached() {
        let registry = ReplicaRegistry::new();
        let result = registry.get_or_hydrate("doc", || {
            Err(crate::error::EngineError::Crdt("bad bytes".to_string()))
        });
        assert!(result.is_err());
        assert!(!registry.is_hydrated("doc"));

        // A later hydration succeeds.
        registry.get_or_hydrate("doc", || Ok(DocTree::new())).unwrap();
        assert!(registry.is_hydrated("doc"));
    }

    #[test]
    fn test_evict_removes_and_notifies() {
        let registry = ReplicaRegistry::new();
        let evicted: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let evicted_clone = Arc::clone(&evicted);
        registry.on_evict(move |id| evicted_clone.lock().unwrap().push(id.to_string()));

        registry.get_or_hydrate("doc", || Ok(DocTree::new())).unwrap();
        assert!(registry.evict("doc").is_some());

        assert!(!registry.is_hydrated("doc"));
        assert_eq!(*evicted.lock().unwrap(), vec!["doc".to_string()]);
    }

    #[test]
    fn test_evict_unknown_does_not_notify() {
        let registry = ReplicaRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        registry.on_evict(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(registry.evict("missing").is_none());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_replace_evicting_persist_failure_keeps_replica() {
        let registry = ReplicaRegistry::new();
        registry.get_or_hydrate("doc", || Ok(DocTree::new())).unwrap();

        let result = registry.replace_evicting("doc", || {
            Err(crate::error::EngineError::Persistence("disk full".to_string()))
        });
        assert!(result.is_err());
        // Persist failed, so the replica was not evicted.
        assert!(registry.is_hydrated("doc"));
    }

    #[test]
    fn test_evict_all() {
        let registry = ReplicaRegistry::new();
        registry.get_or_hydrate("a", || Ok(DocTree::new())).unwrap();
        registry.get_or_hydrate("b", || Ok(DocTree::new())).unwrap();
        assert_eq!(registry.hydrated_count(), 2);

        registry.evict_all();
        assert_eq!(registry.hydrated_count(), 0);
    }
}
