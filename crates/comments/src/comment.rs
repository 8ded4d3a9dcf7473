use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ID_PREFIX: char = 'a';
const ID_SUFFIX: char = 'a';

/// A comment thread entry. The document only holds marks referencing `id`;
/// the record itself is owned by [`crate::CommentList`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub replies: Vec<Comment>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new() -> Self {
        Self::with_id(new_comment_id())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: String::new(),
            replies: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

impl Default for Comment {
    fn default() -> Self {
        Self::new()
    }
}

/// A fresh comment id: a v4 UUID wrapped in letters, so the id always starts
/// with a letter and works as an HTML id or CSS selector.
pub fn new_comment_id() -> String {
    format!("{ID_PREFIX}{}{ID_SUFFIX}", Uuid::new_v4().hyphenated())
}

pub fn is_wrapped_id(id: &str) -> bool {
    let Some(inner) = id
        .strip_prefix(ID_PREFIX)
        .and_then(|rest| rest.strip_suffix(ID_SUFFIX))
    else {
        return false;
    };
    Uuid::parse_str(inner).is_ok()
}
