//! Integration tests for the engine lifecycle: create, edit, store, suggest,
//! overwrite, evict, restore, and two-replica convergence through the sync
//! boundary.

use std::sync::{Arc, Mutex};

use coauthor_core::changes::ChangeKind;
use coauthor_core::doc::DocTree;
use coauthor_core::protocol::SyncMessage;
use coauthor_core::store::{DocumentStore, MemoryStore};
use coauthor_core::{CollabEngine, EngineError};

fn engine_with_store() -> (CollabEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = CollabEngine::new(Arc::clone(&store) as Arc<dyn DocumentStore>);
    (engine, store)
}

#[test]
fn full_document_lifecycle() {
    let (engine, store) = engine_with_store();

    // Create and hydrate.
    engine.create_document("guide", "User Guide").unwrap();
    let tree = engine.on_load("guide").unwrap();
    tree.import_html("<h1>Guide</h1><p>Read me first.</p>");
    engine.on_store("guide").unwrap();

    // The durable record carries the encoded tree.
    let record = store.load_document("guide").unwrap().unwrap();
    assert!(!record.replica_state.is_empty());
    assert_eq!(record.title, "User Guide");

    // Suggestions: a candidate with one word changed.
    let batch = engine
        .suggest_changes("guide", "# Guide\n\nRead me last.", "api-sync")
        .unwrap();
    assert_eq!(batch.changes_count, 2);
    let delete = batch
        .changes
        .iter()
        .find(|c| c.kind == ChangeKind::Delete)
        .unwrap();
    assert_eq!(delete.old_content.as_deref(), Some("first."));

    // The merged text is untouched by suggestions.
    assert_eq!(
        engine.on_load("guide").unwrap().export_html(),
        "<h1>Guide</h1><p>Read me first.</p>"
    );

    // Overwrite: snapshot, persist fresh import, evict.
    engine
        .overwrite_content("guide", "<h1>Guide v2</h1><p>All new.</p>")
        .unwrap();
    assert!(!engine.registry().is_hydrated("guide"));
    assert_eq!(
        engine.on_load("guide").unwrap().export_html(),
        "<h1>Guide v2</h1><p>All new.</p>"
    );

    // The change log survived the overwrite.
    assert_eq!(engine.get_change_log("guide").unwrap().changes_count, 2);

    // Restore the pre-overwrite snapshot.
    let versions = engine.list_versions("guide").unwrap();
    assert!(!versions.is_empty());
    engine.restore_version("guide", versions[0].id).unwrap();
    assert_eq!(
        engine.on_load("guide").unwrap().export_html(),
        "<h1>Guide</h1><p>Read me first.</p>"
    );
}

#[test]
fn two_replicas_converge_through_sync_frames() {
    let (engine, _store) = engine_with_store();
    engine.create_document("shared", "Shared").unwrap();
    let server = engine.on_load("shared").unwrap();
    server.import_html("<p>base text</p>");
    engine.on_store("shared").unwrap();

    // A peer joins with an empty state vector and receives the full diff.
    let peer = DocTree::new();
    let step1 = SyncMessage::SyncStep1(peer.state_vector()).encode();
    let reply = engine.handle_sync_message("shared", &step1).unwrap().unwrap();
    match SyncMessage::decode(&reply).unwrap().unwrap() {
        SyncMessage::SyncStep2(update) => peer.apply_update(&update).unwrap(),
        other => panic!("expected SyncStep2, got {:?}", other),
    }
    assert_eq!(peer.export_html(), "<p>base text</p>");

    // Concurrent edits on both sides, exchanged as update frames.
    server.insert_text(0, 0, "S: ").unwrap();
    peer.insert_text(0, 9, "!").unwrap();

    let peer_frame = SyncMessage::Update(peer.encode()).encode();
    engine.handle_sync_message("shared", &peer_frame).unwrap();
    peer.apply_update(&server.encode()).unwrap();

    assert_eq!(server.export_html(), peer.export_html());
    let merged = server.export_html();
    assert!(merged.contains("S: "));
    assert!(merged.contains('!'));
}

#[test]
fn eviction_severs_live_sessions_on_overwrite() {
    let (engine, _store) = engine_with_store();
    engine.create_document("doc", "Doc").unwrap();
    let tree = engine.on_load("doc").unwrap();
    tree.import_html("<p>collaborative state</p>");
    engine.on_store("doc").unwrap();

    let severed: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let severed_clone = Arc::clone(&severed);
    engine.on_evict(move |id| severed_clone.lock().unwrap().push(id.to_string()));

    engine.overwrite_content("doc", "<p>api wrote this</p>").unwrap();

    // The host was told to drop connections exactly once, and the next load
    // sees only the imported content.
    assert_eq!(severed.lock().unwrap().as_slice(), ["doc"]);
    assert_eq!(
        engine.on_load("doc").unwrap().export_html(),
        "<p>api wrote this</p>"
    );
}

#[test]
fn missing_document_semantics() {
    let (engine, _store) = engine_with_store();

    // Load of an unknown id is a fresh empty document.
    let tree = engine.on_load("brand-new").unwrap();
    assert_eq!(tree.block_count(), 0);

    // Read/update operations on unknown ids are NotFound.
    assert!(matches!(
        engine.get_change_log("nope"),
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        engine.overwrite_content("nope", "<p>x</p>"),
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        engine.list_versions("nope"),
        Err(EngineError::NotFound(_))
    ));
}
