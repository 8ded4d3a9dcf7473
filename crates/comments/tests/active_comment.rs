use std::sync::{Arc, Mutex};

use plate_comments::{
    ACTIVE_COMMENT_KEY, CommentList, CommentMarks, KeyValueStore, MemoryStore, StorageError,
};
use plate_core::{Document, Editor, Node, PluginRegistry, Point, Selection};

struct OfflineStore;

impl KeyValueStore for OfflineStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("offline".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("offline".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("offline".to_string()))
    }
}

fn editor_for(marks: &CommentMarks, text: &str) -> Editor {
    let mut registry = PluginRegistry::richtext();
    registry.register_plugin(marks.plugin()).unwrap();
    let doc = Document {
        children: vec![Node::paragraph(text)],
    };
    Editor::new(doc, Selection::collapsed(Point::new(vec![0, 0], 0)), registry)
}

/// "The quick fox" with "quick" commented as `a123a`.
fn commented_fox() -> (Editor, CommentMarks, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let marks = CommentMarks::new(store.clone());
    let mut editor = editor_for(&marks, "The quick fox");
    assert!(editor.select_range(5, 10));
    assert!(marks.attach(&mut editor, "a123a"));
    (editor, marks, store)
}

fn persisted(store: &MemoryStore) -> Option<String> {
    store.get(ACTIVE_COMMENT_KEY).unwrap()
}

#[test]
fn attach_makes_comment_active_and_persists_it() {
    let (_editor, marks, store) = commented_fox();

    assert_eq!(marks.active_id().as_deref(), Some("a123a"));
    assert_eq!(persisted(&store).as_deref(), Some("a123a"));
}

#[test]
fn caret_inside_comment_activates_it() {
    let (mut editor, marks, store) = commented_fox();
    assert!(editor.select_range(1, 1));
    assert_eq!(marks.active_id(), None);

    editor.set_selection(Selection::collapsed(Point::new(vec![0, 1], 2)));

    assert_eq!(marks.active_id().as_deref(), Some("a123a"));
    assert_eq!(persisted(&store).as_deref(), Some("a123a"));
}

#[test]
fn caret_at_comment_edges_is_outside() {
    let (mut editor, marks, store) = commented_fox();

    assert!(editor.select_range(10, 10));
    assert_eq!(marks.active_id(), None);
    assert_eq!(persisted(&store).as_deref(), Some("null"));

    assert!(editor.select_range(7, 7));
    assert_eq!(marks.active_id().as_deref(), Some("a123a"));

    assert!(editor.select_range(5, 5));
    assert_eq!(marks.active_id(), None);
}

#[test]
fn range_selection_resolves_from_its_start() {
    let (mut editor, marks, _store) = commented_fox();

    assert!(editor.select_range(12, 7));
    assert_eq!(marks.active_id().as_deref(), Some("a123a"));

    assert!(editor.select_range(3, 8));
    assert_eq!(marks.active_id(), None);
}

#[test]
fn other_marks_clear_active_comment_with_empty_value() {
    let (mut editor, marks, store) = commented_fox();
    assert!(editor.select_range(11, 14));
    editor.run_command("marks.toggle_bold", None).unwrap();

    assert!(editor.select_range(12, 12));

    assert_eq!(marks.active_id(), None);
    assert_eq!(persisted(&store).as_deref(), Some(""));
}

#[test]
fn deactivate_clears_without_touching_document() {
    let (editor, marks, store) = commented_fox();
    let doc = editor.doc().clone();

    marks.deactivate();

    assert_eq!(marks.active_id(), None);
    assert_eq!(persisted(&store).as_deref(), Some(""));
    assert_eq!(editor.doc(), &doc);
    assert_eq!(marks.ranges(editor.doc(), "a123a"), vec![5..10]);
}

#[test]
fn subscribers_see_every_evaluation() {
    let (mut editor, marks, _store) = commented_fox();
    let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
    let sink = seen.clone();
    marks.subscribe(move |id| sink.lock().unwrap().push(id.map(str::to_string)));

    assert!(editor.select_range(7, 7));
    assert!(editor.select_range(8, 8));
    assert!(editor.select_range(2, 2));
    marks.deactivate();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            Some("a123a".to_string()),
            Some("a123a".to_string()),
            None,
            None,
        ]
    );
}

#[test]
fn caret_moves_directly_between_comments() {
    let store = Arc::new(MemoryStore::new());
    let marks = CommentMarks::new(store.clone());
    let mut editor = editor_for(&marks, "The quick fox");
    assert!(editor.select_range(1, 4));
    assert!(marks.attach(&mut editor, "aXa"));
    assert!(editor.select_range(5, 10));
    assert!(marks.attach(&mut editor, "aYa"));

    assert!(editor.select_range(2, 2));
    assert_eq!(marks.active_id().as_deref(), Some("aXa"));

    let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
    let sink = seen.clone();
    marks.subscribe(move |id| sink.lock().unwrap().push(id.map(str::to_string)));

    assert!(editor.select_range(7, 7));

    assert_eq!(marks.active_id().as_deref(), Some("aYa"));
    assert_eq!(persisted(&store).as_deref(), Some("aYa"));
    assert_eq!(*seen.lock().unwrap(), vec![Some("aYa".to_string())]);
}

#[test]
fn attach_notifies_subscribers_once() {
    let store = Arc::new(MemoryStore::new());
    let marks = CommentMarks::new(store.clone());
    let mut editor = editor_for(&marks, "The quick fox");
    let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
    let sink = seen.clone();
    marks.subscribe(move |id| sink.lock().unwrap().push(id.map(str::to_string)));
    assert!(editor.select_range(5, 10));
    seen.lock().unwrap().clear();

    assert!(marks.attach(&mut editor, "a123a"));

    assert_eq!(*seen.lock().unwrap(), vec![Some("a123a".to_string())]);
}

#[test]
fn persisted_id_survives_a_new_manager() {
    let (_editor, _marks, store) = commented_fox();

    let reloaded = CommentMarks::new(store.clone());
    assert_eq!(reloaded.active_id(), None);
    assert_eq!(reloaded.last_persisted_active_id().as_deref(), Some("a123a"));

    store.set(ACTIVE_COMMENT_KEY, "null").unwrap();
    assert_eq!(reloaded.last_persisted_active_id(), None);
    store.set(ACTIVE_COMMENT_KEY, "").unwrap();
    assert_eq!(reloaded.last_persisted_active_id(), None);
}

#[test]
fn storage_failures_do_not_block_marking() {
    let marks = CommentMarks::new(Arc::new(OfflineStore));
    let mut editor = editor_for(&marks, "The quick fox");
    assert!(editor.select_range(5, 10));

    assert!(marks.attach(&mut editor, "a123a"));
    assert_eq!(marks.ranges(editor.doc(), "a123a"), vec![5..10]);
    assert_eq!(marks.active_id().as_deref(), Some("a123a"));
    assert_eq!(marks.last_persisted_active_id(), None);

    let mut list = CommentList::load(marks.clone());
    assert!(list.is_empty());
    assert!(editor.select_range(1, 4));
    let id = list.add_comment(&mut editor).unwrap();
    assert!(list.set_content(&id, "still works"));
    assert!(list.resolve(&mut editor, &id));

    assert!(marks.detach(&mut editor, "a123a"));
    assert!(marks.ranges(editor.doc(), "a123a").is_empty());
}
