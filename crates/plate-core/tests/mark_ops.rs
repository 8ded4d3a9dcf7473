use plate_core::{
    ApplyError, Attrs, Document, Editor, MarkAttrSpec, MarkSpec, Node, Op, PlatePlugin,
    PluginRegistry, Point, RenderRule, Selection, Transaction, to_html,
};

struct HighlightPlugin;

impl PlatePlugin for HighlightPlugin {
    fn id(&self) -> &'static str {
        "test.highlight"
    }

    fn mark_specs(&self) -> Vec<MarkSpec> {
        vec![
            MarkSpec::new("highlight", RenderRule::new("mark"))
                .attr(
                    MarkAttrSpec::new("color")
                        .dom_attr("data-color")
                        .default_value(serde_json::json!("orange")),
                )
                .inclusive(false),
        ]
    }
}

fn editor_with_text(text: &str) -> Editor {
    let mut registry = PluginRegistry::richtext();
    registry.register_plugin(Box::new(HighlightPlugin)).unwrap();
    let doc = Document {
        children: vec![Node::paragraph(text)],
    };
    Editor::new(doc, Selection::collapsed(Point::new(vec![0, 0], 0)), registry)
}

fn color(value: &str) -> Attrs {
    let mut attrs = Attrs::new();
    attrs.insert("color".to_string(), serde_json::json!(value));
    attrs
}

fn add_highlight(editor: &mut Editor, range: std::ops::Range<usize>, value: &str) {
    editor
        .apply(Transaction::new(vec![Op::AddMark {
            range,
            mark: "highlight".to_string(),
            attrs: color(value),
        }]))
        .unwrap();
}

fn leaves(editor: &Editor) -> Vec<(String, Option<Attrs>)> {
    let Node::Element(paragraph) = &editor.doc().children[0] else {
        panic!("expected paragraph element");
    };
    paragraph
        .children
        .iter()
        .map(|n| match n {
            Node::Text(t) => (t.text.clone(), t.marks.get("highlight")),
            _ => (String::new(), None),
        })
        .collect()
}

#[test]
fn add_mark_splits_leaves_at_range_boundaries() {
    let mut editor = editor_with_text("abcde");
    add_highlight(&mut editor, 2..4, "yellow");

    assert_eq!(
        leaves(&editor),
        vec![
            ("a".to_string(), None),
            ("bc".to_string(), Some(color("yellow"))),
            ("de".to_string(), None),
        ]
    );
    assert_eq!(
        to_html(editor.doc(), editor.registry()),
        "<p>a<mark data-color=\"yellow\">bc</mark>de</p>"
    );
}

#[test]
fn missing_attr_renders_declared_default() {
    let mut editor = editor_with_text("ab");
    editor
        .apply(Transaction::new(vec![Op::AddMark {
            range: 1..3,
            mark: "highlight".to_string(),
            attrs: Attrs::new(),
        }]))
        .unwrap();

    assert_eq!(
        to_html(editor.doc(), editor.registry()),
        "<p><mark data-color=\"orange\">ab</mark></p>"
    );
}

#[test]
fn add_mark_replaces_same_type_mark() {
    let mut editor = editor_with_text("abcde");
    add_highlight(&mut editor, 2..4, "yellow");
    add_highlight(&mut editor, 1..6, "green");

    assert_eq!(
        leaves(&editor),
        vec![("abcde".to_string(), Some(color("green")))]
    );

    assert!(editor.undo());
    assert_eq!(
        leaves(&editor),
        vec![
            ("a".to_string(), None),
            ("bc".to_string(), Some(color("yellow"))),
            ("de".to_string(), None),
        ]
    );
}

#[test]
fn remove_mark_undo_restores_original_attrs() {
    let mut editor = editor_with_text("abcde");
    add_highlight(&mut editor, 2..4, "yellow");

    editor
        .apply(Transaction::new(vec![Op::RemoveMark {
            range: 1..6,
            mark: "highlight".to_string(),
        }]))
        .unwrap();
    assert_eq!(leaves(&editor), vec![("abcde".to_string(), None)]);

    assert!(editor.undo());
    assert_eq!(
        leaves(&editor),
        vec![
            ("a".to_string(), None),
            ("bc".to_string(), Some(color("yellow"))),
            ("de".to_string(), None),
        ]
    );

    assert!(editor.redo());
    assert_eq!(leaves(&editor), vec![("abcde".to_string(), None)]);
}

#[test]
fn mark_ops_keep_selection_positions() {
    let mut editor = editor_with_text("abcde");
    assert!(editor.select_range(2, 5));

    add_highlight(&mut editor, 3..4, "yellow");

    assert_eq!(editor.selection_range(), Some(2..5));
    assert_eq!(editor.doc().text_between(2..5), "bcd");
}

#[test]
fn mark_range_outside_document_is_rejected() {
    let mut editor = editor_with_text("abc");
    let before = editor.doc().clone();

    let err = editor
        .apply(Transaction::new(vec![Op::AddMark {
            range: 2..40,
            mark: "highlight".to_string(),
            attrs: color("yellow"),
        }]))
        .unwrap_err();

    assert!(matches!(err, ApplyError::InvalidRange(_)));
    assert_eq!(editor.doc(), &before);
}

#[test]
fn failing_op_rolls_back_the_whole_transaction() {
    let mut editor = editor_with_text("The quick fox");
    assert!(editor.select_range(5, 10));
    let before = editor.doc().clone();
    let selection = editor.selection().clone();

    let err = editor
        .apply(Transaction::new(vec![
            Op::InsertText {
                path: vec![0, 0],
                offset: 0,
                text: "XX".to_string(),
            },
            Op::AddMark {
                range: 0..999,
                mark: "bold".to_string(),
                attrs: Attrs::new(),
            },
        ]))
        .unwrap_err();

    assert!(matches!(err, ApplyError::InvalidRange(_)));
    assert_eq!(editor.doc(), &before);
    assert_eq!(editor.selection(), &selection);
    assert!(!editor.can_undo());
}

#[test]
fn invalid_path_after_valid_ops_rolls_back() {
    let mut editor = editor_with_text("abc");
    let before = editor.doc().clone();

    let err = editor
        .apply(Transaction::new(vec![
            Op::InsertNode {
                path: vec![1],
                node: Node::paragraph("second"),
            },
            Op::RemoveText {
                path: vec![4, 0],
                range: 0..1,
            },
        ]))
        .unwrap_err();

    assert!(matches!(err, ApplyError::InvalidPath(_)));
    assert_eq!(editor.doc(), &before);
    assert!(!editor.can_undo());
}

#[test]
fn empty_transaction_leaves_no_undo_record() {
    let mut editor = editor_with_text("abc");

    editor.apply(Transaction::new(Vec::new())).unwrap();

    assert!(!editor.can_undo());
}

#[test]
fn remove_mark_over_unmarked_text_changes_nothing() {
    let mut editor = editor_with_text("abc");
    let before = editor.doc().clone();

    editor
        .apply(Transaction::new(vec![Op::RemoveMark {
            range: 1..4,
            mark: "highlight".to_string(),
        }]))
        .unwrap();

    assert_eq!(editor.doc(), &before);
    assert!(!editor.can_undo());
}

#[test]
fn re_adding_an_identical_mark_leaves_no_undo_record() {
    let mut editor = editor_with_text("abcde");
    add_highlight(&mut editor, 2..4, "yellow");
    assert_eq!(editor.undo_depth(), 1);

    add_highlight(&mut editor, 2..4, "yellow");

    assert_eq!(editor.undo_depth(), 1);
}

#[test]
fn mark_ops_serialize_with_op_tag() {
    let op = Op::RemoveMark {
        range: 1..4,
        mark: "highlight".to_string(),
    };

    let value = serde_json::to_value(&op).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "op": "remove_mark",
            "range": { "start": 1, "end": 4 },
            "mark": "highlight",
        })
    );
    let back: Op = serde_json::from_value(value).unwrap();
    assert_eq!(back, op);
}
