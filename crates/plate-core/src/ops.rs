use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::{Attrs, Marks, Node, Selection};

pub type Path = Vec<usize>;

/// Primitive document edit. Text and node ops address nodes by path; mark ops
/// address absolute ranges (see [`crate::Document::descendants`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    InsertText {
        path: Path,
        offset: usize,
        text: String,
    },
    RemoveText {
        path: Path,
        range: Range<usize>,
    },
    InsertNode {
        path: Path,
        node: Node,
    },
    RemoveNode {
        path: Path,
    },
    SetTextMarks {
        path: Path,
        marks: Marks,
    },
    /// Sets `mark` on every text leaf covered by `range`, splitting leaves at
    /// the range boundaries.
    AddMark {
        range: Range<usize>,
        mark: String,
        #[serde(default)]
        attrs: Attrs,
    },
    RemoveMark {
        range: Range<usize>,
        mark: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    /// Free-form origin label, e.g. `command:marks.toggle_bold`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub ops: Vec<Op>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_after: Option<Selection>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            ..Self::default()
        }
    }

    pub fn selection_after(mut self, selection_after: Selection) -> Self {
        self.selection_after = Some(selection_after);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }

    pub fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    /// No ops and no selection change.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.selection_after.is_none()
    }
}
