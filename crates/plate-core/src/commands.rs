use serde_json::Value;

use crate::core::{Attrs, Marks, Node, Point, Selection, clamp_to_char_boundary};
use crate::editor::Editor;
use crate::mark::{MarkSpec, RenderRule};
use crate::ops::{Op, Transaction};
use crate::plugin::{CommandError, CommandSpec, PlatePlugin, QueryError, QuerySpec};

pub(crate) struct CoreCommandsPlugin;

impl PlatePlugin for CoreCommandsPlugin {
    fn id(&self) -> &'static str {
        "core.commands"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("core.insert_text", "Insert text", |editor, args| {
                let text = args
                    .as_ref()
                    .and_then(|args| args.get("text"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| CommandError::new("Missing args.text"))?;
                insert_text_at_selection(editor, text)
            })
            .description("Insert text at the selection, replacing selected text.")
            .args_example(serde_json::json!({ "text": "Hello" }))
            .hidden(true),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("core.selection_range", |editor, _args| {
                serde_json::to_value(editor.selection_range())
                    .map_err(|err| QueryError::new(err.to_string()))
            }),
            QuerySpec::new("core.marks_at_selection", |editor, _args| {
                let marks = editor
                    .doc()
                    .point_to_pos(&editor.selection().focus)
                    .map(|pos| editor.marks_at(pos))
                    .unwrap_or_default();
                serde_json::to_value(marks).map_err(|err| QueryError::new(err.to_string()))
            }),
        ]
    }
}

fn insert_text_at_selection(editor: &mut Editor, text: &str) -> Result<(), CommandError> {
    let selection = editor.selection().clone();
    let (start, end) = if editor.doc().point_to_pos(&selection.anchor)
        <= editor.doc().point_to_pos(&selection.focus)
    {
        (selection.anchor, selection.focus)
    } else {
        (selection.focus, selection.anchor)
    };
    if start.path != end.path {
        return Err(CommandError::new(
            "Replacing a selection across text leaves is not supported",
        ));
    }
    let leaf = editor
        .doc()
        .text_at(&start.path)
        .ok_or_else(|| CommandError::new("Selection is not in a text leaf"))?;
    let from = clamp_to_char_boundary(&leaf.text, start.offset);
    let to = clamp_to_char_boundary(&leaf.text, end.offset);

    let mut ops = Vec::new();
    if from < to {
        ops.push(Op::RemoveText {
            path: start.path.clone(),
            range: from..to,
        });
    }
    ops.push(Op::InsertText {
        path: start.path.clone(),
        offset: from,
        text: text.to_string(),
    });
    let caret = Point::new(start.path, from + text.len());
    let tx = Transaction::new(ops)
        .selection_after(Selection::collapsed(caret))
        .source("command:core.insert_text");
    editor
        .apply(tx)
        .map_err(|err| CommandError::new(err.to_string()))
}

const TOGGLE_MARKS: [(&str, &str, &str); 5] = [
    ("bold", "Bold", "strong"),
    ("italic", "Italic", "em"),
    ("underline", "Underline", "u"),
    ("strikethrough", "Strikethrough", "s"),
    ("code", "Inline code", "code"),
];

pub(crate) struct MarksCommandsPlugin;

impl PlatePlugin for MarksCommandsPlugin {
    fn id(&self) -> &'static str {
        "marks.commands"
    }

    fn mark_specs(&self) -> Vec<MarkSpec> {
        TOGGLE_MARKS
            .iter()
            .map(|&(name, _, tag)| MarkSpec::new(name, RenderRule::new(tag)))
            .collect()
    }

    fn commands(&self) -> Vec<CommandSpec> {
        TOGGLE_MARKS
            .iter()
            .map(|&(name, label, _)| {
                CommandSpec::new(format!("marks.toggle_{name}"), label, move |editor, _args| {
                    toggle_mark(editor, name)
                })
                .keywords([name])
            })
            .collect()
    }

    fn queries(&self) -> Vec<QuerySpec> {
        let mut queries = vec![QuerySpec::new("marks.get_active", |editor, _args| {
            serde_json::to_value(active_marks(editor))
                .map_err(|err| QueryError::new(err.to_string()))
        })];
        queries.extend(TOGGLE_MARKS.iter().map(|&(name, _, _)| {
            QuerySpec::new(format!("marks.is_{name}_active"), move |editor, _args| {
                Ok(Value::Bool(active_marks(editor).has(name)))
            })
        }));
        queries
    }
}

/// Marks of the text leaf holding the focus.
fn active_marks(editor: &Editor) -> Marks {
    editor
        .doc()
        .text_at(&editor.selection().focus.path)
        .map(|leaf| leaf.marks.clone())
        .unwrap_or_default()
}

/// Removes `name` when the whole selection already carries it, adds it
/// otherwise. A collapsed selection toggles the mark for the next typed text.
fn toggle_mark(editor: &mut Editor, name: &str) -> Result<(), CommandError> {
    let tx = match editor.selection_range() {
        Some(range) if !range.is_empty() => {
            let op = if editor.doc().range_has_mark(range.clone(), name) {
                Op::RemoveMark {
                    range,
                    mark: name.to_string(),
                }
            } else {
                let attrs = editor
                    .registry()
                    .mark_spec(name)
                    .map(MarkSpec::default_attrs)
                    .unwrap_or_default();
                Op::AddMark {
                    range,
                    mark: name.to_string(),
                    attrs,
                }
            };
            Transaction::new(vec![op])
        }
        _ => toggle_at_caret(editor, name)?,
    };
    editor
        .apply(tx.source(format!("command:marks.toggle_{name}")))
        .map_err(|err| CommandError::new(err.to_string()))
}

/// Splits the focused leaf around the caret and parks the caret in an empty
/// leaf carrying the toggled marks.
fn toggle_at_caret(editor: &Editor, name: &str) -> Result<Transaction, CommandError> {
    let focus = editor.selection().focus.clone();
    let leaf = editor
        .doc()
        .text_at(&focus.path)
        .ok_or_else(|| CommandError::new("Selection is not in a text leaf"))?;

    let mut marks = leaf.marks.clone();
    let enable = !marks.has(name);
    marks.set(name, enable.then(Attrs::new));

    if leaf.text.is_empty() {
        let caret = Point::new(focus.path.clone(), 0);
        return Ok(
            Transaction::new(vec![Op::SetTextMarks {
                path: focus.path,
                marks,
            }])
            .selection_after(Selection::collapsed(caret)),
        );
    }

    let Some((&ix, parent)) = focus.path.split_last() else {
        return Err(CommandError::new("Selection is not in a text leaf"));
    };
    let child_path = |i: usize| {
        let mut path = parent.to_vec();
        path.push(i);
        path
    };

    let cursor = clamp_to_char_boundary(&leaf.text, focus.offset);
    let (left, right) = leaf.text.split_at(cursor);
    let mut pieces = Vec::with_capacity(3);
    if !left.is_empty() {
        pieces.push(Node::marked_text(left, leaf.marks.clone()));
    }
    let caret_ix = ix + pieces.len();
    pieces.push(Node::marked_text("", marks));
    if !right.is_empty() {
        pieces.push(Node::marked_text(right, leaf.marks.clone()));
    }

    let mut ops = vec![Op::RemoveNode {
        path: focus.path.clone(),
    }];
    ops.extend(
        pieces
            .into_iter()
            .enumerate()
            .map(|(i, node)| Op::InsertNode {
                path: child_path(ix + i),
                node,
            }),
    );
    let caret = Point::new(child_path(caret_ix), 0);
    Ok(Transaction::new(ops).selection_after(Selection::collapsed(caret)))
}
