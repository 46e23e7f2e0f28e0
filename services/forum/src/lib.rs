//! Forum client
//!
//! Talks to the forum REST backend and keeps a paginated thread list, the
//! focused thread and its comment tree in step with it. The view layer only
//! sees [`state::ViewState`] snapshots and sends [`intent::Intent`]s.

pub mod capability;
pub mod command;
pub mod comment_tree;
pub mod controller;
pub mod cursor;
pub mod error;
pub mod gateway;
pub mod intent;
pub mod media;
pub mod models;
pub mod render;
pub mod session;
pub mod state;
pub mod thread_sync;
pub mod validation;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use controller::ViewController;
pub use error::{ClientError, ClientResult};
pub use gateway::{ForumApi, HttpGateway};
pub use session::SessionStore;
