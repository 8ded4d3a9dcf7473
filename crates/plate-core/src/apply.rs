use std::ops::Range;

use crate::core::{Attrs, Document, Marks, Node, Selection, TextNode, clamp_to_char_boundary};
use crate::ops::Op;
use crate::position::{apply_mark_range, mark_segments};

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error("normalization did not converge")]
    NormalizeDidNotConverge,
}

impl From<PathError> for ApplyError {
    fn from(value: PathError) -> Self {
        ApplyError::InvalidPath(value.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PathError(pub String);

/// Applies one op and returns the ops that undo it, in application order.
pub(crate) fn apply_op(
    doc: &mut Document,
    selection: &mut Selection,
    op: Op,
) -> Result<Vec<Op>, ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let leaf = text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&leaf.text, offset);
            leaf.text.insert_str(offset, &text);
            map_insert_text(selection, &path, offset, text.len());
            Ok(vec![Op::RemoveText {
                range: offset..offset + text.len(),
                path,
            }])
        }
        Op::RemoveText { path, range } => {
            let leaf = text_mut(doc, &path)?;
            let start = clamp_to_char_boundary(&leaf.text, range.start);
            let end = clamp_to_char_boundary(&leaf.text, range.end);
            if start >= end {
                return Ok(Vec::new());
            }
            let removed: String = leaf.text.drain(start..end).collect();
            map_remove_text(selection, &path, start..end);
            Ok(vec![Op::InsertText {
                path,
                offset: start,
                text: removed,
            }])
        }
        Op::InsertNode { path, node } => {
            let (siblings, index) = siblings_mut(doc, &path)?;
            if index > siblings.len() {
                return Err(PathError(format!(
                    "Insert index out of bounds: {index} > {}",
                    siblings.len()
                ))
                .into());
            }
            siblings.insert(index, node);
            map_insert_node(selection, &path);
            Ok(vec![Op::RemoveNode { path }])
        }
        Op::RemoveNode { path } => {
            let (siblings, index) = siblings_mut(doc, &path)?;
            if index >= siblings.len() {
                return Err(PathError(format!(
                    "Remove index out of bounds: {index} >= {}",
                    siblings.len()
                ))
                .into());
            }
            let removed = siblings.remove(index);
            map_remove_node(selection, &path, &removed, doc);
            Ok(vec![Op::InsertNode {
                path,
                node: removed,
            }])
        }
        Op::SetTextMarks { path, marks } => {
            let leaf = text_mut(doc, &path)?;
            let previous = std::mem::replace(&mut leaf.marks, marks);
            Ok(vec![Op::SetTextMarks {
                path,
                marks: previous,
            }])
        }
        Op::AddMark { range, mark, attrs } => {
            check_range(doc, &range)?;
            let segments = mark_segments(doc, &range, &mark);
            with_stable_selection(doc, selection, |doc| {
                apply_mark_range(doc, &range, &|marks: &mut Marks| {
                    marks.set(&mark, Some(attrs.clone()))
                })
            });
            let mut inverse = vec![Op::RemoveMark {
                range,
                mark: mark.clone(),
            }];
            inverse.extend(restore_ops(segments, &mark));
            Ok(inverse)
        }
        Op::RemoveMark { range, mark } => {
            check_range(doc, &range)?;
            let segments = mark_segments(doc, &range, &mark);
            with_stable_selection(doc, selection, |doc| {
                apply_mark_range(doc, &range, &|marks: &mut Marks| marks.set(&mark, None))
            });
            Ok(restore_ops(segments, &mark))
        }
    }
}

/// Re-adds `mark` on every segment that carried it, with its old attributes.
fn restore_ops(segments: Vec<(Range<usize>, Option<Attrs>)>, mark: &str) -> Vec<Op> {
    segments
        .into_iter()
        .filter_map(|(range, attrs)| {
            Some(Op::AddMark {
                range,
                mark: mark.to_string(),
                attrs: attrs?,
            })
        })
        .collect()
}

fn check_range(doc: &Document, range: &Range<usize>) -> Result<(), ApplyError> {
    let size = doc.content_size();
    if range.start > range.end || range.end > size {
        return Err(ApplyError::InvalidRange(format!(
            "Range {}..{} outside document of size {size}",
            range.start, range.end
        )));
    }
    Ok(())
}

/// Mark ops keep positions intact, so the selection survives leaf splits by
/// round-tripping through absolute positions.
fn with_stable_selection(
    doc: &mut Document,
    selection: &mut Selection,
    f: impl FnOnce(&mut Document),
) {
    let positions = selection.points_mut().map(|p| doc.point_to_pos(p));
    f(doc);
    for (point, pos) in selection.points_mut().into_iter().zip(positions) {
        if let Some(mapped) = pos.and_then(|pos| doc.pos_to_point(pos)) {
            *point = mapped;
        }
    }
}

fn map_insert_text(selection: &mut Selection, path: &[usize], offset: usize, len: usize) {
    for point in selection.points_mut() {
        if point.path == path && point.offset >= offset {
            point.offset += len;
        }
    }
}

fn map_remove_text(selection: &mut Selection, path: &[usize], range: Range<usize>) {
    for point in selection.points_mut() {
        if point.path != path || point.offset <= range.start {
            continue;
        }
        point.offset = if point.offset >= range.end {
            point.offset - (range.end - range.start)
        } else {
            range.start
        };
    }
}

fn map_insert_node(selection: &mut Selection, path: &[usize]) {
    let Some((&index, parent)) = path.split_last() else {
        return;
    };
    let depth = parent.len();
    for point in selection.points_mut() {
        if point.path.len() > depth && point.path.starts_with(parent) && point.path[depth] >= index
        {
            point.path[depth] += 1;
        }
    }
}

/// `doc` is the document after the removal. A removed text leaf whose text
/// now starts its right sibling (with equal marks) was folded into it, so
/// points inside it keep their offset in that sibling.
fn map_remove_node(selection: &mut Selection, path: &[usize], removed: &Node, doc: &Document) {
    let Some((&index, parent)) = path.split_last() else {
        return;
    };
    let depth = parent.len();

    let folded = match removed {
        Node::Text(gone) => doc
            .text_at(path)
            .is_some_and(|t| t.marks == gone.marks && t.text.starts_with(&gone.text)),
        _ => false,
    };

    for point in selection.points_mut() {
        if point.path.len() <= depth || !point.path.starts_with(parent) {
            continue;
        }
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix - 1;
        } else if ix == index {
            point.path.truncate(depth + 1);
            if !folded {
                point.path[depth] = index.saturating_sub(1);
                point.offset = 0;
            }
        }
    }
}

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, PathError> {
    let (&first, rest) = path
        .split_first()
        .ok_or_else(|| PathError("Empty path".into()))?;
    let mut node = doc
        .children
        .get_mut(first)
        .ok_or_else(|| out_of_bounds(0, first))?;
    for (depth, &ix) in rest.iter().enumerate() {
        node = match node {
            Node::Element(el) => el
                .children
                .get_mut(ix)
                .ok_or_else(|| out_of_bounds(depth + 1, ix))?,
            Node::Text(_) | Node::Void(_) => {
                return Err(PathError(format!("Non-container node at depth {depth}")));
            }
        };
    }
    Ok(node)
}

fn out_of_bounds(depth: usize, ix: usize) -> PathError {
    PathError(format!("Path out of bounds at depth {depth}: {ix}"))
}

fn text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, PathError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        _ => Err(PathError(format!("Expected a text leaf at {path:?}"))),
    }
}

/// The child list holding the node at `path`, plus its index in that list.
fn siblings_mut<'a>(
    doc: &'a mut Document,
    path: &[usize],
) -> Result<(&'a mut Vec<Node>, usize), PathError> {
    let (&index, parent) = path
        .split_last()
        .ok_or_else(|| PathError("Empty path".into()))?;
    if parent.is_empty() {
        return Ok((&mut doc.children, index));
    }
    match node_mut(doc, parent)? {
        Node::Element(el) => Ok((&mut el.children, index)),
        Node::Text(_) | Node::Void(_) => Err(PathError("Parent is not a container".into())),
    }
}
