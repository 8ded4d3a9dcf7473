use crate::core::{Document, Node, TextNode};
use crate::ops::{Op, Path};
use crate::plugin::{ChildConstraint, NormalizePass, PlatePlugin, PluginRegistry};

pub(crate) struct CoreNormalizePlugin;

impl PlatePlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(EnsureTextLeaf),
            Box::new(MergeAdjacentTextLeaves),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        if !doc.children.is_empty() {
            return Vec::new();
        }
        vec![Op::InsertNode {
            path: vec![0],
            node: Node::paragraph(""),
        }]
    }
}

/// Inline containers always hold at least one text leaf, so the caret has
/// somewhere to go.
struct EnsureTextLeaf;

impl NormalizePass for EnsureTextLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_text_leaf"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        // Reverse document order: an insert only shifts paths already visited.
        doc.descendants()
            .into_iter()
            .rev()
            .filter_map(|d| {
                let Node::Element(el) = d.node else {
                    return None;
                };
                let needs_leaf = registry.child_constraint(el) == ChildConstraint::Inline
                    && !el.children.iter().any(|n| matches!(n, Node::Text(_)));
                needs_leaf.then(|| Op::InsertNode {
                    path: child_path(&d.path, 0),
                    node: Node::text(""),
                })
            })
            .collect()
    }
}

/// Joins neighbouring text leaves that carry identical marks.
struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for d in doc.descendants().into_iter().rev() {
            let Node::Element(el) = d.node else {
                continue;
            };
            if el.children.len() < 2 || registry.child_constraint(el) != ChildConstraint::Inline {
                continue;
            }
            for (start, run) in text_runs(&el.children).into_iter().rev() {
                merge_run(&d.path, start, &run, &mut ops);
            }
        }
        ops
    }
}

/// Maximal runs of two or more adjacent text leaves with equal marks, keyed
/// by the index of their first leaf.
fn text_runs(children: &[Node]) -> Vec<(usize, Vec<&TextNode>)> {
    let mut runs = Vec::new();
    let mut ix = 0;
    while ix < children.len() {
        let Some(first) = children[ix].as_text() else {
            ix += 1;
            continue;
        };
        let run: Vec<&TextNode> = std::iter::once(first)
            .chain(
                children[ix + 1..]
                    .iter()
                    .map_while(|n| n.as_text().filter(|t| t.marks == first.marks)),
            )
            .collect();
        let len = run.len();
        if len > 1 {
            runs.push((ix, run));
        }
        ix += len;
    }
    runs
}

/// Folds each leaf of the run into its right neighbour, right to left, so the
/// whole run ends up in its first slot.
fn merge_run(parent: &[usize], start: usize, run: &[&TextNode], ops: &mut Vec<Op>) {
    let Some((_, folded)) = run.split_last() else {
        return;
    };
    for (offset, leaf) in folded.iter().enumerate().rev() {
        let ix = start + offset;
        if !leaf.text.is_empty() {
            ops.push(Op::InsertText {
                path: child_path(parent, ix + 1),
                offset: 0,
                text: leaf.text.clone(),
            });
        }
        ops.push(Op::RemoveNode {
            path: child_path(parent, ix),
        });
    }
}

fn child_path(parent: &[usize], ix: usize) -> Path {
    let mut path = parent.to_vec();
    path.push(ix);
    path
}
