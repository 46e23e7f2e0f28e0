//! Comment model and related payloads

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ThreadId, UserId};

/// Backend comment identifier
pub type CommentId = u64;

/// Comment as returned by `GET /comments`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub creator_id: UserId,
    pub thread_id: ThreadId,
    #[serde(default)]
    pub parent_comment_id: Option<CommentId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: BTreeSet<UserId>,
}

impl Comment {
    /// Whether `user` is in the like set
    pub fn liked_by(&self, user: UserId) -> bool {
        self.likes.contains(&user)
    }
}

/// New comment payload; a `None` parent is sent as `null`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,
    pub thread_id: ThreadId,
    pub parent_comment_id: Option<CommentId>,
}

/// Comment update payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentUpdate {
    pub id: CommentId,
    pub content: String,
}
