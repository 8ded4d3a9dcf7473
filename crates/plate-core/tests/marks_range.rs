use plate_core::{Document, Editor, Node, PluginRegistry, Point, Selection};

fn editor_with_selection(text: &str, anchor: usize, focus: usize) -> Editor {
    let doc = Document {
        children: vec![Node::paragraph(text)],
    };
    let selection = Selection {
        anchor: Point::new(vec![0, 0], anchor),
        focus: Point::new(vec![0, 0], focus),
    };
    Editor::new(doc, selection, PluginRegistry::richtext())
}

fn bold_runs(editor: &Editor) -> Vec<(String, bool)> {
    let Node::Element(paragraph) = &editor.doc().children[0] else {
        panic!("expected paragraph element");
    };
    paragraph
        .children
        .iter()
        .map(|n| match n {
            Node::Text(t) => (t.text.clone(), t.marks.bold),
            _ => (String::new(), false),
        })
        .collect()
}

#[test]
fn toggle_bold_only_affects_selection_range() {
    let mut editor = editor_with_selection("abcde", 1, 3);

    editor.run_command("marks.toggle_bold", None).unwrap();

    assert_eq!(
        bold_runs(&editor),
        vec![
            ("a".to_string(), false),
            ("bc".to_string(), true),
            ("de".to_string(), false),
        ]
    );
    assert_eq!(editor.selection_range(), Some(2..4));

    editor.run_command("marks.toggle_bold", None).unwrap();

    assert_eq!(bold_runs(&editor), vec![("abcde".to_string(), false)]);
    assert_eq!(editor.selection_range(), Some(2..4));
}

#[test]
fn toggle_over_partially_marked_range_marks_all_of_it() {
    let mut editor = editor_with_selection("abcde", 1, 3);
    editor.run_command("marks.toggle_bold", None).unwrap();

    assert!(editor.select_range(1, 6));
    editor.run_command("marks.toggle_bold", None).unwrap();

    assert_eq!(bold_runs(&editor), vec![("abcde".to_string(), true)]);
}

#[test]
fn reversed_selection_toggles_the_same_range() {
    let mut editor = editor_with_selection("abcde", 3, 1);

    editor.run_command("marks.toggle_italic", None).unwrap();

    let Node::Element(paragraph) = &editor.doc().children[0] else {
        panic!("expected paragraph element");
    };
    let italic: Vec<_> = paragraph
        .children
        .iter()
        .filter_map(|n| match n {
            Node::Text(t) if t.marks.italic => Some(t.text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(italic, vec!["bc".to_string()]);
}
