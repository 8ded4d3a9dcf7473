use serde::{Deserialize, Serialize};

pub const DEFAULT_MARK_NAME: &str = "comment";
pub const DEFAULT_CSS_CLASS: &str = "comment";
pub const ACTIVE_COMMENT_KEY: &str = "activeCommentId";
pub const COMMENTS_KEY: &str = "comments";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommentConfig {
    /// Mark name registered with the editor.
    pub mark_name: String,
    /// Class put on the rendered comment span.
    pub css_class: String,
    /// Storage key holding the last active comment id.
    pub active_key: String,
    /// Storage key holding the serialized comment collection.
    pub collection_key: String,
}

impl Default for CommentConfig {
    fn default() -> Self {
        Self {
            mark_name: DEFAULT_MARK_NAME.to_string(),
            css_class: DEFAULT_CSS_CLASS.to_string(),
            active_key: ACTIVE_COMMENT_KEY.to_string(),
            collection_key: COMMENTS_KEY.to_string(),
        }
    }
}
