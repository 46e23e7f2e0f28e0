//! Thread model and related payloads

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Backend thread identifier
pub type ThreadId = u64;

/// Thread as returned by `GET /thread`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: ThreadId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub lock: bool,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: BTreeSet<UserId>,
    #[serde(default)]
    pub watchees: BTreeSet<UserId>,
}

impl Thread {
    /// Whether `user` is in the like set
    pub fn liked_by(&self, user: UserId) -> bool {
        self.likes.contains(&user)
    }

    /// Whether `user` is in the watch set
    pub fn watched_by(&self, user: UserId) -> bool {
        self.watchees.contains(&user)
    }
}

/// New thread payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewThread {
    pub title: String,
    pub is_public: bool,
    pub content: String,
}

/// Thread update payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThreadUpdate {
    pub id: ThreadId,
    pub title: String,
    pub is_public: bool,
    pub lock: bool,
    pub content: String,
}
