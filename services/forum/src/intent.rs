//! User intents
//!
//! Each constructor validates its input and returns either a ready-to-send
//! [`Intent`] or a validation error, without touching the network.

use std::path::PathBuf;

use crate::error::{ClientError, ClientResult};
use crate::models::{
    CommentId, CommentUpdate, Credentials, NewComment, NewThread, Registration, ThreadId,
    ThreadUpdate,
};
use crate::validation;

/// Requested profile changes; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDraft {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    /// Image file to upload as the new avatar
    pub image_path: Option<PathBuf>,
}

/// Something the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Login(Credentials),
    Register(Registration),
    Logout,
    LoadMoreThreads,
    OpenThread(ThreadId),
    CreateThread(NewThread),
    EditThread(ThreadUpdate),
    DeleteThread(ThreadId),
    ToggleThreadLike(ThreadId),
    ToggleThreadWatch(ThreadId),
    PostComment(NewComment),
    EditComment(CommentUpdate),
    ToggleCommentLike(CommentId),
    ShowProfile,
    UpdateProfile(ProfileDraft),
}

fn check(result: Result<(), String>) -> ClientResult<()> {
    result.map_err(ClientError::Validation)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Intent {
    pub fn login(email: &str, password: &str) -> ClientResult<Self> {
        check(validation::validate_required("Email", email))?;
        check(validation::validate_password(password))?;
        Ok(Intent::Login(Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        }))
    }

    pub fn register(email: &str, name: &str, password: &str, confirmation: &str) -> ClientResult<Self> {
        check(validation::validate_password_confirmation(password, confirmation))?;
        check(validation::validate_email(email.trim()))?;
        check(validation::validate_name(name))?;
        check(validation::validate_password(password))?;
        Ok(Intent::Register(Registration {
            email: email.trim().to_string(),
            password: password.to_string(),
            name: name.trim().to_string(),
        }))
    }

    pub fn create_thread(title: &str, content: &str, is_public: bool) -> ClientResult<Self> {
        check(validation::validate_required("Title", title))?;
        check(validation::validate_required("Content", content))?;
        Ok(Intent::CreateThread(NewThread {
            title: title.trim().to_string(),
            is_public,
            content: content.to_string(),
        }))
    }

    pub fn edit_thread(
        id: ThreadId,
        title: &str,
        content: &str,
        is_public: bool,
        lock: bool,
    ) -> ClientResult<Self> {
        check(validation::validate_required("Title", title))?;
        check(validation::validate_required("Content", content))?;
        Ok(Intent::EditThread(ThreadUpdate {
            id,
            title: title.trim().to_string(),
            is_public,
            lock,
            content: content.to_string(),
        }))
    }

    /// Top-level comment on a thread
    pub fn post_comment(thread_id: ThreadId, content: &str) -> ClientResult<Self> {
        Self::comment(thread_id, None, content)
    }

    /// Reply to an existing comment; validated exactly like a top-level one
    pub fn reply(thread_id: ThreadId, parent: CommentId, content: &str) -> ClientResult<Self> {
        Self::comment(thread_id, Some(parent), content)
    }

    fn comment(thread_id: ThreadId, parent: Option<CommentId>, content: &str) -> ClientResult<Self> {
        check(validation::validate_required("Comment", content))?;
        Ok(Intent::PostComment(NewComment {
            content: content.to_string(),
            thread_id,
            parent_comment_id: parent,
        }))
    }

    pub fn edit_comment(id: CommentId, content: &str) -> ClientResult<Self> {
        check(validation::validate_required("Comment", content))?;
        Ok(Intent::EditComment(CommentUpdate {
            id,
            content: content.to_string(),
        }))
    }

    /// Blank fields are treated as unchanged
    pub fn update_profile(draft: ProfileDraft) -> ClientResult<Self> {
        let draft = ProfileDraft {
            email: non_blank(draft.email).map(|e| e.trim().to_string()),
            name: non_blank(draft.name).map(|n| n.trim().to_string()),
            password: draft.password.filter(|p| !p.is_empty()),
            image_path: draft.image_path,
        };
        if let Some(email) = &draft.email {
            check(validation::validate_email(email))?;
        }
        if let Some(name) = &draft.name {
            check(validation::validate_name(name))?;
        }
        if let Some(password) = &draft.password {
            check(validation::validate_password(password))?;
        }
        Ok(Intent::UpdateProfile(draft))
    }

    /// Whether the intent needs a signed-in user
    pub fn requires_session(&self) -> bool {
        !matches!(self, Intent::Login(_) | Intent::Register(_))
    }
}
