//! Forum models shared by the gateway and the sync components

pub mod comment;
pub mod thread;
pub mod user;

// Re-export for convenience
pub use comment::{Comment, CommentId, CommentUpdate, NewComment};
pub use thread::{NewThread, Thread, ThreadId, ThreadUpdate};
pub use user::{AuthToken, Credentials, ProfileUpdate, Registration, User, UserId};

use serde::{Deserialize, Serialize};

/// Response of the create endpoints
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Created {
    pub id: u64,
}

/// Body of the like/watch toggle endpoints
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Toggle {
    pub id: u64,
    pub turnon: bool,
}
