use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use plate_core::{
    ApplyError, Attrs, CommandError, CommandSpec, Document, Editor, MarkAttrSpec, MarkSpec, Op,
    ParseRule, PlatePlugin, QueryError, QuerySpec, RenderRule, SelectionObserver, Transaction,
};
use serde_json::Value;

use crate::config::CommentConfig;
use crate::storage::KeyValueStore;

pub const COMMENT_ID_ATTR: &str = "commentId";
pub const COMMENT_ID_DOM_ATTR: &str = "data-comment-id";
pub const SNIPPET_ATTR: &str = "snippet";

/// Written to the active-id key when the caret sits on unmarked text.
const NO_MARKS_SENTINEL: &str = "null";

#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("comment id is empty")]
    EmptyId,

    #[error("selection is collapsed")]
    CollapsedSelection,

    #[error("failed to apply comment transaction: {0}")]
    Apply(#[from] ApplyError),
}

type ActiveListener = Arc<dyn Fn(Option<&str>) + Send + Sync>;

struct CommentState {
    config: CommentConfig,
    active_id: Option<String>,
    store: Arc<dyn KeyValueStore>,
    listeners: Vec<ActiveListener>,
    /// Set while the manager applies its own attach transaction.
    muted: bool,
}

/// Per-editor handle on the comment marks: attaches and detaches comment
/// marks and tracks which comment the caret is in.
///
/// Clones share state. Register [`CommentMarks::plugin`] with the editor's
/// registry so selection changes reach the tracker.
#[derive(Clone)]
pub struct CommentMarks {
    inner: Arc<Mutex<CommentState>>,
}

impl CommentMarks {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(CommentConfig::default(), store)
    }

    pub fn with_config(config: CommentConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CommentState {
                config,
                active_id: None,
                store,
                listeners: Vec::new(),
                muted: false,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, CommentState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn plugin(&self) -> Box<dyn PlatePlugin> {
        Box::new(CommentPlugin {
            marks: self.clone(),
        })
    }

    pub fn config(&self) -> CommentConfig {
        self.state().config.clone()
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        self.state().store.clone()
    }

    /// The mark spec registered for comments.
    pub fn mark_spec(&self) -> MarkSpec {
        let config = self.config();
        MarkSpec::new(
            config.mark_name,
            RenderRule::new("span").class(config.css_class),
        )
        .attr(MarkAttrSpec::new(COMMENT_ID_ATTR).dom_attr(COMMENT_ID_DOM_ATTR))
        .attr(MarkAttrSpec::new(SNIPPET_ATTR))
        .parse_rules(vec![
            ParseRule::new("span").required_attr(COMMENT_ID_DOM_ATTR),
        ])
        .inclusive(false)
    }

    pub fn active_id(&self) -> Option<String> {
        self.state().active_id.clone()
    }

    /// Called with the new active id after every re-evaluation.
    pub fn subscribe(&self, listener: impl Fn(Option<&str>) + Send + Sync + 'static) {
        self.state().listeners.push(Arc::new(listener));
    }

    /// The active id recorded by a previous session, if any.
    pub fn last_persisted_active_id(&self) -> Option<String> {
        let (store, key) = {
            let state = self.state();
            (state.store.clone(), state.config.active_key.clone())
        };
        match store.get(&key) {
            Ok(Some(id)) if !id.is_empty() && id != NO_MARKS_SENTINEL => Some(id),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(error = %err, key = %key, "failed to read active comment id");
                None
            }
        }
    }

    /// Wraps the current selection in a comment mark carrying `comment_id`
    /// and makes it the active comment.
    ///
    /// Returns false, leaving the document untouched, when
    /// [`CommentMarks::try_attach`] fails. Subscribers hear about the new id
    /// once.
    pub fn attach(&self, editor: &mut Editor, comment_id: &str) -> bool {
        match self.try_attach(editor, comment_id) {
            Ok(()) => true,
            Err(err @ CommentError::Apply(_)) => {
                tracing::warn!(error = %err, comment_id, "failed to attach comment");
                false
            }
            Err(err) => {
                tracing::debug!(reason = %err, comment_id, "comment not attached");
                false
            }
        }
    }

    /// [`CommentMarks::attach`] with the reason for a refusal.
    pub fn try_attach(&self, editor: &mut Editor, comment_id: &str) -> Result<(), CommentError> {
        if comment_id.is_empty() {
            return Err(CommentError::EmptyId);
        }
        let range = editor
            .selection_range()
            .filter(|r| !r.is_empty())
            .ok_or(CommentError::CollapsedSelection)?;

        let mark = self.config().mark_name;
        let snippet = editor.doc().text_between(range.clone());
        let mut attrs = Attrs::new();
        attrs.insert(
            COMMENT_ID_ATTR.to_string(),
            Value::String(comment_id.to_string()),
        );
        attrs.insert(SNIPPET_ATTR.to_string(), Value::String(snippet));

        let tx = Transaction::new(vec![Op::AddMark {
            range: range.clone(),
            mark,
            attrs,
        }])
        .source("command:comment.set");

        self.state().muted = true;
        let applied = editor.apply(tx);
        self.state().muted = false;
        applied?;

        tracing::debug!(comment_id, from = range.start, to = range.end, "attached comment");
        self.set_active(Some(comment_id.to_string()), comment_id);
        Ok(())
    }

    /// Strips every span carrying `comment_id` in a single transaction.
    ///
    /// All spans are collected before the transaction is built. Finding no
    /// span is a successful no-op.
    pub fn detach(&self, editor: &mut Editor, comment_id: &str) -> bool {
        match self.try_detach(editor, comment_id) {
            Ok(()) => true,
            Err(err @ CommentError::Apply(_)) => {
                tracing::warn!(error = %err, comment_id, "failed to detach comment");
                false
            }
            Err(err) => {
                tracing::debug!(reason = %err, comment_id, "comment not detached");
                false
            }
        }
    }

    pub fn try_detach(&self, editor: &mut Editor, comment_id: &str) -> Result<(), CommentError> {
        if comment_id.is_empty() {
            return Err(CommentError::EmptyId);
        }

        let mark = self.config().mark_name;
        let ranges = comment_ranges(editor.doc(), &mark, comment_id);
        let mut tx = Transaction::new(Vec::new()).source("command:comment.unset");
        for range in &ranges {
            tx.push(Op::RemoveMark {
                range: range.clone(),
                mark: mark.clone(),
            });
        }
        if tx.is_empty() {
            tracing::debug!(comment_id, "no spans to detach");
            return Ok(());
        }

        editor.apply(tx)?;
        tracing::debug!(comment_id, spans = ranges.len(), "detached comment");
        Ok(())
    }

    /// Clears the active comment without touching the document.
    pub fn deactivate(&self) {
        self.set_active(None, "");
    }

    /// Absolute ranges of every text span marked with `comment_id`.
    pub fn ranges(&self, doc: &Document, comment_id: &str) -> Vec<Range<usize>> {
        comment_ranges(doc, &self.config().mark_name, comment_id)
    }

    fn selection_changed(&self, editor: &Editor) {
        let mark = {
            let state = self.state();
            if state.muted {
                return;
            }
            state.config.mark_name.clone()
        };
        let active = editor
            .selection_range()
            .map(|range| editor.marks_at(range.start))
            .unwrap_or_default();

        if active.is_empty() {
            self.set_active(None, NO_MARKS_SENTINEL);
            return;
        }

        let id = active
            .iter()
            .find(|entry| entry.name == mark)
            .and_then(|entry| entry.attrs.get(COMMENT_ID_ATTR))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let persisted = id.clone().unwrap_or_default();
        self.set_active(id, &persisted);
    }

    fn set_active(&self, id: Option<String>, persisted: &str) {
        let (store, key, listeners) = {
            let mut state = self.state();
            if state.active_id != id {
                tracing::trace!(from = ?state.active_id, to = ?id, "active comment changed");
            }
            state.active_id = id.clone();
            (
                state.store.clone(),
                state.config.active_key.clone(),
                state.listeners.clone(),
            )
        };

        if let Err(err) = store.set(&key, persisted) {
            tracing::warn!(error = %err, key = %key, "failed to persist active comment id");
        }
        for listener in &listeners {
            listener(id.as_deref());
        }
    }
}

/// Full-document scan for text leaves whose `mark` carries `comment_id`.
pub fn comment_ranges(doc: &Document, mark: &str, comment_id: &str) -> Vec<Range<usize>> {
    doc.descendants()
        .into_iter()
        .filter(|d| {
            d.as_text()
                .and_then(|t| t.marks.custom.get(mark))
                .and_then(|attrs| attrs.get(COMMENT_ID_ATTR))
                .and_then(Value::as_str)
                == Some(comment_id)
        })
        .map(|d| d.range())
        .collect()
}

struct CommentPlugin {
    marks: CommentMarks,
}

struct ActiveCommentTracker {
    marks: CommentMarks,
}

impl SelectionObserver for ActiveCommentTracker {
    fn id(&self) -> &'static str {
        "comment.active_tracker"
    }

    fn selection_changed(&self, editor: &Editor) {
        self.marks.selection_changed(editor);
    }
}

fn id_arg(args: Option<&Value>) -> Result<String, CommandError> {
    args.and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| CommandError::new("Missing args.id"))
}

impl PlatePlugin for CommentPlugin {
    fn id(&self) -> &'static str {
        "comment"
    }

    fn mark_specs(&self) -> Vec<MarkSpec> {
        vec![self.marks.mark_spec()]
    }

    fn selection_observers(&self) -> Vec<Box<dyn SelectionObserver>> {
        vec![Box::new(ActiveCommentTracker {
            marks: self.marks.clone(),
        })]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        let attach = self.marks.clone();
        let detach = self.marks.clone();
        vec![
            CommandSpec::new("comment.set", "Add comment", move |editor, args| {
                let id = id_arg(args.as_ref())?;
                attach
                    .try_attach(editor, &id)
                    .map_err(|err| CommandError::new(format!("Failed to attach comment: {err}")))
            })
            .description("Mark the current selection with a comment id.")
            .keywords(["comment", "annotate", "note"])
            .args_example(serde_json::json!({ "id": "a123a" })),
            CommandSpec::new("comment.unset", "Remove comment", move |editor, args| {
                let id = id_arg(args.as_ref())?;
                detach
                    .try_detach(editor, &id)
                    .map_err(|err| CommandError::new(format!("Failed to detach comment: {err}")))
            })
            .description("Remove every mark carrying the comment id.")
            .keywords(["comment", "resolve", "delete"])
            .args_example(serde_json::json!({ "id": "a123a" })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        let active = self.marks.clone();
        let ranges = self.marks.clone();
        vec![
            QuerySpec::new("comment.active_id", move |_editor, _args| {
                Ok(active.active_id().map(Value::String).unwrap_or(Value::Null))
            }),
            QuerySpec::new("comment.ranges", move |editor, args| {
                let id = id_arg(args.as_ref()).map_err(|err| QueryError::new(err.message()))?;
                serde_json::to_value(ranges.ranges(editor.doc(), &id))
                    .map_err(|err| QueryError::new(format!("Failed to encode ranges: {err}")))
            }),
        ]
    }
}
