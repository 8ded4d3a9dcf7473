use std::ops::Range;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::apply::{ApplyError, apply_op};
use crate::core::{Document, Node, Point, Selection, clamp_to_char_boundary};
use crate::ops::{Op, Path, Transaction};
use crate::plugin::{CommandError, PluginRegistry, QueryError};
use crate::position::MarkEntry;

const DEFAULT_MAX_UNDO: usize = 200;
const DEFAULT_MAX_NORMALIZE_ITERATIONS: usize = 100;

/// Zero means "use the default" for every field.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
}

impl EditorConfig {
    fn with_defaults(self) -> Self {
        let or_default = |value: usize, default: usize| if value == 0 { default } else { value };
        Self {
            max_undo: or_default(self.max_undo, DEFAULT_MAX_UNDO),
            max_normalize_iterations: or_default(
                self.max_normalize_iterations,
                DEFAULT_MAX_NORMALIZE_ITERATIONS,
            ),
        }
    }
}

/// One history step. `inverse_ops` revert the step when applied in order.
#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Selection,
    pub selection_after: Selection,
}

pub struct Editor {
    doc: Document,
    selection: Selection,
    registry: PluginRegistry,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, registry: PluginRegistry) -> Self {
        Self::with_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: Selection,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Self {
        let mut editor = Self {
            doc,
            selection,
            registry,
            config: config.with_defaults(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        };
        editor.normalize_in_place();
        editor
    }

    /// An empty paragraph with the caret inside it.
    pub fn empty(registry: PluginRegistry) -> Self {
        let doc = Document {
            children: vec![Node::paragraph("")],
        };
        Self::new(doc, Selection::collapsed(Point::new(vec![0, 0], 0)), registry)
    }

    pub fn with_core_plugins() -> Self {
        Self::empty(PluginRegistry::core())
    }

    pub fn with_richtext_plugins() -> Self {
        Self::empty(PluginRegistry::richtext())
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = resolve_selection(&self.doc, &selection);
        self.notify_selection_observers();
    }

    /// Selects between two absolute positions. Returns false when either
    /// position does not resolve to a text point.
    pub fn select_range(&mut self, anchor: usize, focus: usize) -> bool {
        match (self.doc.pos_to_point(anchor), self.doc.pos_to_point(focus)) {
            (Some(anchor), Some(focus)) => {
                self.set_selection(Selection::new(anchor, focus));
                true
            }
            _ => false,
        }
    }

    /// The selection as an ordered absolute range (`from..to`).
    pub fn selection_range(&self) -> Option<Range<usize>> {
        let anchor = self.doc.point_to_pos(&self.selection.anchor)?;
        let focus = self.doc.point_to_pos(&self.selection.focus)?;
        Some(anchor.min(focus)..anchor.max(focus))
    }

    /// Resolved mark set at an absolute position. Marks without a registered
    /// spec count as inclusive.
    pub fn marks_at(&self, pos: usize) -> Vec<MarkEntry> {
        self.doc.marks_at(pos, |name| {
            self.registry
                .mark_spec(name)
                .is_none_or(|spec| spec.inclusive)
        })
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };
        let record = self.replay(record, false);
        self.redo_stack.push(record);
        self.notify_selection_observers();
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };
        let record = self.replay(record, true);
        self.undo_stack.push(record);
        self.notify_selection_observers();
        true
    }

    /// Applies the record's ops and returns the record that reverts them.
    fn replay(&mut self, record: UndoRecord, forward: bool) -> UndoRecord {
        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let mut reverted: Vec<Op> = Vec::new();
        for op in inverse_ops {
            match apply_op(&mut self.doc, &mut self.selection, op) {
                Ok(inverse) => reverted.extend(inverse.into_iter().rev()),
                Err(err) => {
                    tracing::warn!(%err, "history replay stopped early");
                    break;
                }
            }
        }
        reverted.reverse();

        self.selection = if forward {
            selection_after.clone()
        } else {
            selection_before.clone()
        };
        self.normalize_in_place();

        UndoRecord {
            inverse_ops: reverted,
            selection_before,
            selection_after,
        }
    }

    /// Applies every op of `tx` as one edit unit: one undo record, one
    /// normalization run, one round of selection observers. On error the
    /// document and selection are left exactly as they were.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let Transaction {
            ops,
            selection_after,
            meta,
        } = tx;
        let doc_before = self.doc.clone();
        let selection_before = self.selection.clone();
        let op_count = ops.len();

        let inverse_ops = match self.apply_ops(ops, selection_after) {
            Ok(inverse_ops) => inverse_ops,
            Err(err) => {
                self.doc = doc_before;
                self.selection = selection_before;
                tracing::debug!(
                    %err,
                    source = meta.source.as_deref().unwrap_or("unknown"),
                    "transaction rolled back"
                );
                return Err(err);
            }
        };

        tracing::trace!(
            source = meta.source.as_deref().unwrap_or("unknown"),
            ops = op_count,
            "applied transaction"
        );

        if self.doc != doc_before {
            let selection_after = self.selection.clone();
            self.push_undo(UndoRecord {
                inverse_ops,
                selection_before,
                selection_after,
            });
        }
        self.notify_selection_observers();
        Ok(())
    }

    /// Runs the ops and normalization, returning the ops that undo both.
    fn apply_ops(
        &mut self,
        ops: Vec<Op>,
        selection_after: Option<Selection>,
    ) -> Result<Vec<Op>, ApplyError> {
        let mut inverse_ops: Vec<Op> = Vec::new();
        for op in ops {
            let inverse = apply_op(&mut self.doc, &mut self.selection, op)?;
            inverse_ops.extend(inverse.into_iter().rev());
        }
        if let Some(selection) = selection_after {
            self.selection = selection;
        }

        inverse_ops.extend(self.normalize_with_inverse_ops()?);
        inverse_ops.reverse();
        self.selection = resolve_selection(&self.doc, &self.selection);
        Ok(inverse_ops)
    }

    fn push_undo(&mut self, record: UndoRecord) {
        self.undo_stack.push(record);
        self.redo_stack.clear();
        let overflow = self.undo_stack.len().saturating_sub(self.config.max_undo);
        self.undo_stack.drain(..overflow);
    }

    pub fn run_command(&mut self, id: &str, args: Option<Value>) -> Result<(), CommandError> {
        let command = self
            .registry
            .command(id)
            .ok_or_else(|| CommandError::new(format!("Unknown command: {id}")))?;
        (command.handler)(self, args)
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        let query = self
            .registry
            .query(id)
            .ok_or_else(|| QueryError::new(format!("Unknown query: {id}")))?;
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        serde_json::from_value(value)
            .map_err(|err| QueryError::new(format!("Failed to decode query result: {err}")))
    }

    fn notify_selection_observers(&self) {
        for observer in self.registry.selection_observers() {
            observer.selection_changed(self);
        }
    }

    fn normalize_in_place(&mut self) {
        if let Err(err) = self.normalize_with_inverse_ops() {
            tracing::warn!(%err, "normalization failed");
        }
        self.selection = resolve_selection(&self.doc, &self.selection);
    }

    /// Runs the registered passes until they stop producing ops and returns
    /// the ops that undo everything they changed.
    fn normalize_with_inverse_ops(&mut self) -> Result<Vec<Op>, ApplyError> {
        let mut inverse_ops: Vec<Op> = Vec::new();
        for _ in 0..self.config.max_normalize_iterations {
            let ops = self.registry.normalize(&self.doc);
            if ops.is_empty() {
                return Ok(inverse_ops);
            }
            for op in ops {
                let inverse = apply_op(&mut self.doc, &mut self.selection, op)?;
                inverse_ops.extend(inverse.into_iter().rev());
            }
        }
        tracing::warn!(
            iterations = self.config.max_normalize_iterations,
            "normalization did not converge"
        );
        Err(ApplyError::NormalizeDidNotConverge)
    }
}

/// Moves both points onto existing text leaves. A point that cannot be placed
/// falls back to the other point, then to the start of the document.
fn resolve_selection(doc: &Document, selection: &Selection) -> Selection {
    let anchor = resolve_point(doc, &selection.anchor)
        .or_else(|| resolve_point(doc, &selection.focus))
        .unwrap_or_else(|| Point::new(doc.first_text_path().unwrap_or_else(|| vec![0]), 0));
    let focus = resolve_point(doc, &selection.focus).unwrap_or_else(|| anchor.clone());
    Selection::new(anchor, focus)
}

fn resolve_point(doc: &Document, point: &Point) -> Option<Point> {
    let mut path: Path = Vec::with_capacity(point.path.len());
    let mut children: &[Node] = &doc.children;
    for &wanted in &point.path {
        let Some(last) = children.len().checked_sub(1) else {
            break;
        };
        let ix = wanted.min(last);
        path.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                let offset = clamp_to_char_boundary(&t.text, point.offset);
                return Some(Point::new(path, offset));
            }
            Node::Element(el) => children = &el.children,
            Node::Void(_) => return None,
        }
    }

    // The path stopped at an element: use its first text leaf.
    let rest = first_text_under(doc.node(&path)?)?;
    path.extend(rest);
    Some(Point::new(path, 0))
}

fn first_text_under(node: &Node) -> Option<Path> {
    node.children()
        .iter()
        .enumerate()
        .find_map(|(ix, child)| match child {
            Node::Text(_) => Some(vec![ix]),
            Node::Element(_) => first_text_under(child).map(|mut rest| {
                rest.insert(0, ix);
                rest
            }),
            Node::Void(_) => None,
        })
}
