use plate_core::Editor;

use crate::comment::{Comment, new_comment_id};
use crate::marks::CommentMarks;
use crate::storage::StorageError;

/// The comment sidebar model: owns the comment records and drives the marks
/// through [`CommentMarks`]. Every mutation is written back to the store.
pub struct CommentList {
    comments: Vec<Comment>,
    marks: CommentMarks,
}

impl CommentList {
    pub fn new(marks: CommentMarks) -> Self {
        Self {
            comments: Vec::new(),
            marks,
        }
    }

    /// Restores the collection saved under the configured key. A missing or
    /// unreadable entry yields an empty list.
    pub fn load(marks: CommentMarks) -> Self {
        let comments = match Self::read(&marks) {
            Ok(comments) => comments,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load comments; starting empty");
                Vec::new()
            }
        };
        Self { comments, marks }
    }

    fn read(marks: &CommentMarks) -> Result<Vec<Comment>, StorageError> {
        let key = marks.config().collection_key;
        match marks.store().get(&key)? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    pub fn marks(&self) -> &CommentMarks {
        &self.marks
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    /// Creates a record with a fresh id and marks the current selection with
    /// it. The record is dropped again when the selection cannot be marked.
    pub fn add_comment(&mut self, editor: &mut Editor) -> Option<String> {
        let id = new_comment_id();
        if !self.marks.attach(editor, &id) {
            return None;
        }
        self.comments.push(Comment::with_id(id.clone()));
        self.save();
        Some(id)
    }

    /// Replaces the body of one comment.
    pub fn set_content(&mut self, id: &str, content: impl Into<String>) -> bool {
        let Some(comment) = self.comments.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        comment.content = content.into();
        self.save();
        true
    }

    /// Ends editing: the comment stays, nothing is active any more.
    pub fn commit_editing(&mut self) {
        self.marks.deactivate();
    }

    /// Removes the marks and then the record.
    pub fn resolve(&mut self, editor: &mut Editor, id: &str) -> bool {
        if !self.marks.detach(editor, id) {
            return false;
        }
        let before = self.comments.len();
        self.comments.retain(|c| c.id != id);
        if self.comments.len() != before {
            self.save();
        }
        true
    }

    pub fn active(&self) -> Option<&Comment> {
        let id = self.marks.active_id()?;
        self.get(&id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.marks.active_id().as_deref() == Some(id)
    }

    /// Best effort: failures are logged and otherwise ignored.
    pub fn save(&self) {
        if let Err(err) = self.write() {
            tracing::warn!(error = %err, "failed to save comments");
        }
    }

    fn write(&self) -> Result<(), StorageError> {
        let key = self.marks.config().collection_key;
        let raw = serde_json::to_string(&self.comments)?;
        self.marks.store().set(&key, &raw)
    }
}
