use std::sync::{Arc, Mutex};

use context_session::{
    ChatRole, ChatSession, SessionError, SessionListener, SessionStore, SharedSessionStore, StoreConfig,
};
use context_tree::{
    build_from_graph, ClassDependencyGraph, ClassFacts, MethodFacts, MutationOutcome, RemovalTarget,
    SelectedFile, WorkspaceRef,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn workspace() -> WorkspaceRef {
    WorkspaceRef::new("shop", "/work/shop")
}

fn store_in(dir: &TempDir) -> SessionStore {
    SessionStore::open(StoreConfig::new(dir.path().join("chat_sessions.json")))
}

fn service_class() -> ClassFacts {
    ClassFacts {
        workspace: workspace(),
        file_path: "/work/shop/orders/src/OrderService.java".to_string(),
        qualified_name: Some("shop.orders.OrderService".to_string()),
        name: Some("OrderService".to_string()),
        methods: vec![MethodFacts::new("place", vec![]), MethodFacts::new("cancel", vec![])],
        handle: None,
    }
}

#[derive(Default)]
struct RecordingListener {
    trees: Mutex<Vec<String>>,
    lists: Mutex<usize>,
}

impl SessionListener for RecordingListener {
    fn tree_changed(&self, session: &ChatSession) {
        self.trees.lock().unwrap().push(session.id.clone());
    }

    fn session_list_changed(&self) {
        *self.lists.lock().unwrap() += 1;
    }
}

#[test]
fn latest_session_is_selected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat_sessions.json");
    let older = ChatSession {
        id: "older".to_string(),
        ..ChatSession::started_at("shop", 100)
    };
    let newer = ChatSession {
        id: "newer".to_string(),
        ..ChatSession::started_at("shop", 200)
    };
    let other = ChatSession {
        id: "other".to_string(),
        ..ChatSession::started_at("billing", 300)
    };
    std::fs::write(&path, serde_json::to_vec(&vec![older, newer, other]).unwrap()).unwrap();

    let mut store = SessionStore::open(StoreConfig::new(&path));
    let current = store.current_session("shop");
    assert_eq!(current.id, "newer");
    assert!(current.relevant_workspaces.contains("shop"));

    let ids: Vec<_> = store.sessions().iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids, vec!["other", "newer", "older"]);
}

#[test]
fn corrupt_entries_are_dropped_individually() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat_sessions.json");
    std::fs::write(
        &path,
        r#"[
            {"id": "good", "type": "chat", "workspace": "shop", "startTime": 5,
             "appFileTree": {"projectFileTrees": []},
             "messages": [{"role": "user", "content": "hello"}]},
            {"id": "broken", "startTime": "yesterday"},
            {"id": "bad-role", "startTime": 6, "messages": [{"role": "robot", "content": "x"}]}
        ]"#,
    )
    .unwrap();

    let mut store = SessionStore::open(StoreConfig::new(&path));
    assert_eq!(store.sessions().len(), 1);
    assert_eq!(store.current_session("shop").messages[0].content, "hello");
}

#[test]
fn unparseable_document_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("chat_sessions.json"), "[{").unwrap();

    let mut store = store_in(&dir);
    assert!(store.sessions().is_empty());
    let fresh = store.current_session("shop");
    assert!(fresh.app_file_tree.is_empty());
    assert_eq!(fresh.workspace, "shop");
}

#[test]
fn tree_edits_persist_and_notify() {
    let dir = tempfile::tempdir().unwrap();
    let listener = Arc::new(RecordingListener::default());
    let mut store = store_in(&dir);
    store.add_listener(listener.clone());

    let outcome = store
        .add_method(&service_class(), &MethodFacts::new("place", vec![]))
        .unwrap();
    assert_eq!(outcome, MutationOutcome::Changed);
    let id = store.current_session("shop").id.clone();
    assert_eq!(*listener.trees.lock().unwrap(), vec![id.clone()]);

    let mut reopened = store_in(&dir);
    let session = reopened.current_session("shop");
    assert_eq!(session.id, id);
    let file = session
        .app_file_tree
        .project("shop")
        .unwrap()
        .find_file("orders/src/OrderService.java")
        .unwrap();
    assert_eq!(file.find_class("OrderService").unwrap().methods().len(), 1);
}

#[test]
fn skipped_edits_do_not_notify() {
    let dir = tempfile::tempdir().unwrap();
    let listener = Arc::new(RecordingListener::default());
    let mut store = store_in(&dir);
    store.add_listener(listener.clone());

    let outcome = store
        .add_file(&workspace(), &SelectedFile::new("/elsewhere/Notes.java"))
        .unwrap();
    assert!(outcome.is_skipped());
    assert!(listener.trees.lock().unwrap().is_empty());
    assert!(!dir.path().join("chat_sessions.json").exists());
}

#[test]
fn create_session_moves_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);
    let first = store.current_session("shop").id.clone();

    let second = store.create_session("shop").unwrap();
    assert_ne!(first, second);
    assert_eq!(store.current_session("shop").id, second);
    assert!(!store.session(&first).unwrap().relevant_workspaces.contains("shop"));
    assert!(store.session(&first).unwrap().start_time < store.session(&second).unwrap().start_time);

    store.set_current_session("shop", &first).unwrap();
    assert_eq!(store.current_session("shop").id, first);
    assert!(store.session(&first).unwrap().relevant_workspaces.contains("shop"));

    assert!(matches!(
        store.set_current_session("shop", "missing"),
        Err(SessionError::UnknownSession(_))
    ));
}

#[test]
fn dispose_keeps_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);
    let id = store.create_session("shop").unwrap();

    store.dispose("shop");
    let session = store.session(&id).unwrap();
    assert!(session.relevant_workspaces.is_empty());
    assert_eq!(store.current_session("shop").id, id);
}

#[test]
fn delete_session_falls_back_to_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);
    let id = store.create_session("shop").unwrap();

    store.delete_session(&id).unwrap();
    assert!(store.session(&id).is_none());
    assert_ne!(store.current_session("shop").id, id);
    assert!(store.delete_session(&id).is_err());
}

#[test]
fn messages_append_truncate_export() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);

    store.append_message("shop", ChatRole::User, "first").unwrap();
    store.append_message("shop", ChatRole::Assistant, "second").unwrap();
    let last = store.append_message("shop", ChatRole::User, "third").unwrap();
    assert_eq!(last, 2);

    assert!(!store.truncate_messages_after("shop", 2).unwrap());
    assert!(store.truncate_messages_after("shop", 0).unwrap());
    assert_eq!(store.export_chat_history("shop"), "user: first");

    let mut reopened = store_in(&dir);
    assert_eq!(reopened.current_session("shop").messages.len(), 1);
}

#[test]
fn replace_and_merge_built_trees() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);
    let mut graph = ClassDependencyGraph::new();
    graph.insert(service_class(), vec![MethodFacts::new("place", vec![])]);
    let built = build_from_graph(&graph);

    assert!(store.replace_tree("shop", built.clone()).unwrap().is_changed());
    assert_eq!(store.replace_tree("shop", built.clone()).unwrap(), MutationOutcome::Unchanged);
    assert_eq!(store.merge_tree("shop", built).unwrap(), MutationOutcome::Unchanged);

    let target = RemovalTarget::file("orders/src/OrderService.java");
    assert!(store.remove_selected("shop", &target).unwrap().is_changed());
    assert!(store
        .current_session("shop")
        .app_file_tree
        .project("shop")
        .unwrap()
        .find_file("orders/src/OrderService.java")
        .is_none());
}

#[cfg(unix)]
#[test]
fn persist_failure_keeps_memory() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the parent directory should be makes every write fail
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    let mut store = SessionStore::open(StoreConfig::new(blocker.join("chat_sessions.json")));

    let err = store
        .add_method(&service_class(), &MethodFacts::new("place", vec![]))
        .unwrap_err();
    assert!(matches!(err, SessionError::Persist { .. }));
    assert!(!store.current_session("shop").app_file_tree.is_empty());
}

#[test]
fn shared_store_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let shared = SharedSessionStore::new(store_in(&dir));

    let handle = shared.clone();
    std::thread::spawn(move || {
        handle
            .with(|store| store.add_method(&service_class(), &MethodFacts::new("place", vec![])))
            .unwrap();
    })
    .join()
    .unwrap();

    let snapshot = shared.snapshot_tree("shop");
    assert_eq!(snapshot.stats().methods, 1);
    assert_eq!(shared.snapshot_session("shop").app_file_tree, snapshot);
}
