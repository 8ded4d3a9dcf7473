use plate_core::{
    Document, Editor, EditorConfig, Node, Op, PluginRegistry, Point, Selection, Transaction,
};

fn editor_with_text(text: &str) -> Editor {
    let doc = Document {
        children: vec![Node::paragraph(text)],
    };
    let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
    Editor::new(doc, selection, PluginRegistry::core())
}

fn insert(offset: usize, text: &str) -> Transaction {
    Transaction::new(vec![Op::InsertText {
        path: vec![0, 0],
        offset,
        text: text.to_string(),
    }])
}

#[test]
fn undo_redo_handles_multi_op_insert_order() {
    let mut editor = editor_with_text("");

    let tx = Transaction::new(vec![
        Op::InsertText {
            path: vec![0, 0],
            offset: 0,
            text: "a".to_string(),
        },
        Op::InsertText {
            path: vec![0, 0],
            offset: 1,
            text: "b".to_string(),
        },
    ])
    .selection_after(Selection::collapsed(Point::new(vec![0, 0], 2)))
    .source("test:multi_insert");

    editor.apply(tx).unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("ab")]);
    assert_eq!(editor.selection().focus.offset, 2);

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("")]);
    assert_eq!(editor.selection().focus.offset, 0);

    assert!(editor.redo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("ab")]);
    assert_eq!(editor.selection().focus.offset, 2);
}

#[test]
fn undo_restores_split_and_normalized_leaves() {
    let doc = Document {
        children: vec![Node::paragraph("XYZ")],
    };
    let selection = Selection::new(Point::new(vec![0, 0], 1), Point::new(vec![0, 0], 2));
    let mut editor = Editor::new(doc, selection, PluginRegistry::richtext());
    let selection_before = editor.selection().clone();

    editor.run_command("marks.toggle_bold", None).unwrap();
    let doc_after = editor.doc().clone();
    let Node::Element(paragraph) = &doc_after.children[0] else {
        panic!("expected paragraph element");
    };
    assert_eq!(paragraph.children.len(), 3);

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("XYZ")]);
    assert_eq!(editor.selection(), &selection_before);

    assert!(editor.redo());
    assert_eq!(editor.doc(), &doc_after);
}

#[test]
fn new_edit_clears_redo_stack() {
    let mut editor = editor_with_text("");
    editor.apply(insert(0, "a")).unwrap();
    assert!(editor.undo());
    assert!(editor.can_redo());

    editor.apply(insert(0, "b")).unwrap();

    assert!(!editor.can_redo());
    assert!(!editor.redo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("b")]);
}

#[test]
fn undo_history_is_capped_by_config() {
    let doc = Document {
        children: vec![Node::paragraph("")],
    };
    let config = EditorConfig {
        max_undo: 2,
        ..EditorConfig::default()
    };
    let mut editor = Editor::with_config(
        doc,
        Selection::collapsed(Point::new(vec![0, 0], 0)),
        PluginRegistry::core(),
        config,
    );
    assert_eq!(editor.config().max_normalize_iterations, 100);

    editor.apply(insert(0, "a")).unwrap();
    editor.apply(insert(1, "b")).unwrap();
    editor.apply(insert(2, "c")).unwrap();
    assert_eq!(editor.undo_depth(), 2);

    assert!(editor.undo());
    assert!(editor.undo());
    assert!(!editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("a")]);
}
