//! View state shared with the view layer
//!
//! Everything a renderer needs lives in one immutable [`ViewState`]. Components
//! publish changes through [`ViewPublisher`]; renderers hold a
//! `watch::Receiver` and redraw whenever it changes.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::models::{Thread, User, UserId};
use crate::thread_sync::FocusedThread;

/// Severity of a message shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// One-line message about the last action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// The profile editor, pre-filled
#[derive(Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub user: User,
    /// Password typed at login, when this process saw it
    pub password: Option<String>,
}

impl fmt::Debug for ProfileView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileView")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Snapshot of everything on screen
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub user_id: Option<UserId>,
    /// Threads loaded so far, newest first
    pub threads: Arc<Vec<Thread>>,
    pub has_more: bool,
    pub focused: Option<FocusedThread>,
    pub profile: Option<ProfileView>,
    pub notice: Option<Notice>,
    /// Bumped on every change
    pub revision: u64,
}

impl ViewState {
    pub fn is_signed_in(&self) -> bool {
        self.user_id.is_some()
    }
}

/// Single writer side of the view state channel
pub struct ViewPublisher {
    tx: watch::Sender<ViewState>,
}

impl Default for ViewPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewPublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ViewState::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.tx.subscribe()
    }

    /// Copy of the current state
    pub fn current(&self) -> ViewState {
        self.tx.borrow().clone()
    }

    /// Apply a change and wake subscribers
    pub fn update(&self, change: impl FnOnce(&mut ViewState)) {
        self.tx.send_modify(|state| {
            change(state);
            state.revision += 1;
        });
    }

    pub fn notify(&self, notice: Notice) {
        self.update(|state| state.notice = Some(notice));
    }

    /// Back to the signed-out screen
    pub fn clear(&self) {
        self.update(|state| {
            let revision = state.revision;
            *state = ViewState {
                revision,
                ..ViewState::default()
            };
        });
    }
}
