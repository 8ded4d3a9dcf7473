//! Absolute positions over the document tree.
//!
//! An element occupies `2 + size(children)` (one token for opening and one for
//! closing), a text leaf occupies its byte length and a void occupies 1. The
//! first top-level node starts at position 0, so the text inside the first
//! paragraph starts at 1.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::{Attrs, Document, Marks, Node, Point, TextNode, clamp_to_char_boundary};
use crate::ops::Path;

/// One entry of a resolved mark set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkEntry {
    pub name: String,
    #[serde(default)]
    pub attrs: Attrs,
}

/// A node visited by [`Document::descendants`].
#[derive(Debug, Clone)]
pub struct Descendant<'a> {
    pub node: &'a Node,
    pub path: Path,
    pub pos: usize,
    pub size: usize,
}

impl Descendant<'_> {
    pub fn range(&self) -> Range<usize> {
        self.pos..self.pos + self.size
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self.node {
            Node::Text(t) => Some(t),
            _ => None,
        }
    }
}

impl Node {
    pub fn size(&self) -> usize {
        match self {
            Node::Text(t) => t.text.len(),
            Node::Void(_) => 1,
            Node::Element(el) => 2 + el.children.iter().map(Node::size).sum::<usize>(),
        }
    }
}

impl Document {
    pub fn content_size(&self) -> usize {
        self.children.iter().map(Node::size).sum()
    }

    /// Every node in document order with its path, position and size.
    pub fn descendants(&self) -> Vec<Descendant<'_>> {
        fn walk<'a>(
            nodes: &'a [Node],
            path: &mut Vec<usize>,
            mut pos: usize,
            out: &mut Vec<Descendant<'a>>,
        ) {
            for (ix, node) in nodes.iter().enumerate() {
                path.push(ix);
                let size = node.size();
                out.push(Descendant {
                    node,
                    path: path.clone(),
                    pos,
                    size,
                });
                if let Node::Element(el) = node {
                    walk(&el.children, path, pos + 1, out);
                }
                pos += size;
                path.pop();
            }
        }

        let mut out = Vec::new();
        walk(&self.children, &mut Vec::new(), 0, &mut out);
        out
    }

    fn text_leaves(&self) -> impl Iterator<Item = (Descendant<'_>, &TextNode)> {
        self.descendants().into_iter().filter_map(|d| match d.node {
            Node::Text(t) => Some((d, t)),
            _ => None,
        })
    }

    pub fn point_to_pos(&self, point: &Point) -> Option<usize> {
        let mut pos = 0usize;
        let mut children: &[Node] = &self.children;
        let last = point.path.len().checked_sub(1)?;

        for (depth, &ix) in point.path.iter().enumerate() {
            let node = children.get(ix)?;
            pos += children[..ix].iter().map(Node::size).sum::<usize>();
            if depth == last {
                return match node {
                    Node::Text(t) => Some(pos + point.offset.min(t.text.len())),
                    _ => None,
                };
            }
            match node {
                Node::Element(el) => {
                    pos += 1;
                    children = &el.children;
                }
                Node::Void(_) | Node::Text(_) => return None,
            }
        }
        None
    }

    /// Resolves a position to a text point. A position on the boundary of two
    /// leaves resolves to the start of the later one.
    pub fn pos_to_point(&self, pos: usize) -> Option<Point> {
        let mut at_end: Option<Point> = None;
        for (d, t) in self.text_leaves() {
            let end = d.pos + d.size;
            if d.pos <= pos && pos < end {
                let offset = clamp_to_char_boundary(&t.text, pos - d.pos);
                return Some(Point::new(d.path, offset));
            }
            if pos == end && at_end.is_none() {
                at_end = Some(Point::new(d.path, d.size));
            }
        }
        at_end
    }

    /// Plain text covered by `range`, with text blocks separated by `\n`.
    pub fn text_between(&self, range: Range<usize>) -> String {
        let mut out = String::new();
        let mut last_parent: Option<Path> = None;
        for (d, t) in self.text_leaves() {
            let end = d.pos + d.size;
            if end <= range.start || d.pos >= range.end {
                continue;
            }
            let parent = d.path[..d.path.len() - 1].to_vec();
            if last_parent.as_ref().is_some_and(|p| *p != parent) {
                out.push('\n');
            }
            let from = clamp_to_char_boundary(&t.text, range.start.saturating_sub(d.pos));
            let to = clamp_to_char_boundary(&t.text, range.end.min(end) - d.pos);
            out.push_str(&t.text[from..to]);
            last_parent = Some(parent);
        }
        out
    }

    /// Resolved mark set at `pos`.
    ///
    /// Uses the marks of the leaf before `pos`, or of the leaf after it at the
    /// start of a block. A mark whose name fails `inclusive` is only kept if
    /// the leaf after `pos` carries it as well.
    pub fn marks_at(&self, pos: usize, inclusive: impl Fn(&str) -> bool) -> Vec<MarkEntry> {
        let mut before: Option<&TextNode> = None;
        let mut after: Option<&TextNode> = None;
        for (d, t) in self.text_leaves() {
            let end = d.pos + d.size;
            if d.size == 0 && d.pos == pos {
                // An empty leaf at the caret carries the pending marks.
                return t.marks.entries();
            }
            if d.pos < pos && pos <= end {
                before = Some(t);
            }
            if d.pos <= pos && pos < end && after.is_none() {
                after = Some(t);
            }
        }

        match (before, after) {
            (Some(before), after) => before
                .marks
                .entries()
                .into_iter()
                .filter(|entry| {
                    inclusive(&entry.name) || after.is_some_and(|a| a.marks.has(&entry.name))
                })
                .collect(),
            (None, Some(after)) => after.marks.entries(),
            (None, None) => Vec::new(),
        }
    }

    /// True when every non-empty text leaf overlapping `range` carries `mark`.
    pub fn range_has_mark(&self, range: Range<usize>, mark: &str) -> bool {
        let mut any = false;
        for (d, t) in self.text_leaves() {
            let end = d.pos + d.size;
            if d.size == 0 || end <= range.start || d.pos >= range.end {
                continue;
            }
            if !t.marks.has(mark) {
                return false;
            }
            any = true;
        }
        any
    }
}

fn leaf_touches(start: usize, size: usize, range: &Range<usize>) -> bool {
    if size == 0 {
        if range.is_empty() {
            return start == range.start;
        }
        return range.start < start && start < range.end;
    }
    start < range.end && range.start < start + size
}

/// Per-leaf view of `mark` over `range`: each covered slice with the mark's
/// attributes at that slice before any change.
pub(crate) fn mark_segments(
    doc: &Document,
    range: &Range<usize>,
    mark: &str,
) -> Vec<(Range<usize>, Option<Attrs>)> {
    doc.text_leaves()
        .filter(|(d, _)| leaf_touches(d.pos, d.size, range))
        .map(|(d, t)| {
            let from = d.pos.max(range.start).min(d.pos + d.size);
            let to = (d.pos + d.size).min(range.end).max(from);
            (from..to, t.marks.get(mark))
        })
        .collect()
}

/// Rewrites the marks of every leaf slice covered by `range`, splitting leaves
/// at the range boundaries.
pub(crate) fn apply_mark_range(
    doc: &mut Document,
    range: &Range<usize>,
    apply: &dyn Fn(&mut Marks),
) {
    fn walk(nodes: &mut Vec<Node>, mut pos: usize, range: &Range<usize>, apply: &dyn Fn(&mut Marks)) {
        let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
        for node in nodes.drain(..) {
            let start = pos;
            let size = node.size();
            pos += size;
            match node {
                Node::Element(mut el) => {
                    if start < range.end && range.start < start + size {
                        walk(&mut el.children, start + 1, range, apply);
                    }
                    out.push(Node::Element(el));
                }
                Node::Text(t) if leaf_touches(start, size, range) => {
                    split_leaf(t, start, range, apply, &mut out);
                }
                other => out.push(other),
            }
        }
        *nodes = out;
    }

    walk(&mut doc.children, 0, range, apply);
}

fn split_leaf(
    t: TextNode,
    start: usize,
    range: &Range<usize>,
    apply: &dyn Fn(&mut Marks),
    out: &mut Vec<Node>,
) {
    let sel_start = clamp_to_char_boundary(&t.text, range.start.saturating_sub(start));
    let sel_end = clamp_to_char_boundary(&t.text, range.end.saturating_sub(start));

    if t.text.is_empty() || (sel_start == 0 && sel_end == t.text.len()) {
        let mut next = t;
        apply(&mut next.marks);
        out.push(Node::Text(next));
        return;
    }
    if sel_start >= sel_end {
        out.push(Node::Text(t));
        return;
    }

    let prefix = &t.text[..sel_start];
    let middle = &t.text[sel_start..sel_end];
    let suffix = &t.text[sel_end..];

    if !prefix.is_empty() {
        out.push(Node::marked_text(prefix, t.marks.clone()));
    }
    let mut marks = t.marks.clone();
    apply(&mut marks);
    out.push(Node::marked_text(middle, marks));
    if !suffix.is_empty() {
        out.push(Node::marked_text(suffix, t.marks));
    }
}
