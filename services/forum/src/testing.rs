//! Test doubles for [`ForumApi`]
//!
//! [`InMemoryForum`] behaves like the real backend for a single client: one
//! acting user (set by login/registration or [`InMemoryForum::act_as`]),
//! newest-first thread pages of five, creator-or-admin checks on mutations.
//! [`MockForumApi`] is re-exported for call-count expectations.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};

pub use crate::gateway::MockForumApi;

use crate::cursor::PAGE_SIZE;
use crate::error::{ClientError, ClientResult};
use crate::gateway::ForumApi;
use crate::models::{
    AuthToken, Comment, CommentId, CommentUpdate, Credentials, NewComment, NewThread,
    ProfileUpdate, Registration, Thread, ThreadId, ThreadUpdate, User, UserId,
};

const EPOCH_SECS: i64 = 1_704_067_200;

fn rejected(status: u16, message: &str) -> ClientError {
    ClientError::Http {
        status,
        message: message.to_string(),
    }
}

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
struct Backend {
    next_id: u64,
    clock: i64,
    accounts: BTreeMap<UserId, Account>,
    threads: BTreeMap<ThreadId, Thread>,
    comments: BTreeMap<CommentId, Comment>,
    acting: Option<UserId>,
    calls: HashMap<&'static str, usize>,
}

impl Backend {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 60;
        DateTime::<Utc>::from_timestamp(EPOCH_SECS + self.clock, 0).expect("timestamp in range")
    }

    fn record(&mut self, op: &'static str) {
        *self.calls.entry(op).or_default() += 1;
    }

    fn acting(&self) -> ClientResult<UserId> {
        self.acting.ok_or_else(|| rejected(403, "Invalid token"))
    }

    fn is_admin(&self, user: UserId) -> bool {
        self.accounts.get(&user).is_some_and(|a| a.user.admin)
    }

    fn can_moderate(&self, user: UserId, creator: UserId) -> bool {
        user == creator || self.is_admin(user)
    }

    fn thread(&self, id: ThreadId) -> ClientResult<&Thread> {
        self.threads
            .get(&id)
            .ok_or_else(|| rejected(400, "Invalid thread ID"))
    }

    fn thread_mut(&mut self, id: ThreadId) -> ClientResult<&mut Thread> {
        self.threads
            .get_mut(&id)
            .ok_or_else(|| rejected(400, "Invalid thread ID"))
    }

    fn visible(&self, thread: &Thread, user: UserId) -> bool {
        thread.is_public || self.can_moderate(user, thread.creator_id)
    }

    fn issue_token(&mut self, user_id: UserId) -> AuthToken {
        self.acting = Some(user_id);
        AuthToken {
            token: format!("token-{}", user_id),
            user_id,
        }
    }
}

/// In-memory backend implementing [`ForumApi`]
#[derive(Default)]
pub struct InMemoryForum {
    backend: Mutex<Backend>,
    holds: Mutex<HashMap<ThreadId, Arc<Notify>>>,
}

impl InMemoryForum {
    /// Create an empty forum
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account and return its id
    pub async fn seed_user(&self, email: &str, name: &str, password: &str, admin: bool) -> UserId {
        let mut backend = self.backend.lock().await;
        let id = backend.allocate_id();
        backend.accounts.insert(
            id,
            Account {
                user: User {
                    id,
                    email: email.to_string(),
                    name: name.to_string(),
                    image: None,
                    admin,
                },
                password: password.to_string(),
            },
        );
        id
    }

    /// Add a public thread and return its id; later threads are newer
    pub async fn seed_thread(&self, creator: UserId, title: &str, content: &str) -> ThreadId {
        let mut backend = self.backend.lock().await;
        let id = backend.allocate_id();
        let created_at = backend.tick();
        backend.threads.insert(
            id,
            Thread {
                id,
                title: title.to_string(),
                content: content.to_string(),
                is_public: true,
                lock: false,
                creator_id: creator,
                created_at,
                likes: Default::default(),
                watchees: Default::default(),
            },
        );
        id
    }

    /// Add a comment and return its id; later comments are newer
    pub async fn seed_comment(
        &self,
        thread_id: ThreadId,
        creator: UserId,
        content: &str,
        parent: Option<CommentId>,
    ) -> CommentId {
        let mut backend = self.backend.lock().await;
        let id = backend.allocate_id();
        let created_at = backend.tick();
        backend.comments.insert(
            id,
            Comment {
                id,
                content: content.to_string(),
                creator_id: creator,
                thread_id,
                parent_comment_id: parent,
                created_at,
                likes: Default::default(),
            },
        );
        id
    }

    /// Drop a comment as if another client had deleted it
    pub async fn remove_comment(&self, id: CommentId) {
        self.backend.lock().await.comments.remove(&id);
    }

    /// Set the profile image of a user
    pub async fn set_image(&self, user: UserId, image: &str) {
        if let Some(account) = self.backend.lock().await.accounts.get_mut(&user) {
            account.user.image = Some(image.to_string());
        }
    }

    /// Change the user the backend believes is calling
    pub async fn act_as(&self, user: Option<UserId>) {
        self.backend.lock().await.acting = user;
    }

    /// Current state of a thread, bypassing access checks
    pub async fn thread(&self, id: ThreadId) -> Option<Thread> {
        self.backend.lock().await.threads.get(&id).cloned()
    }

    /// Number of calls made to an operation, by trait method name
    pub async fn calls(&self, op: &str) -> usize {
        self.backend.lock().await.calls.get(op).copied().unwrap_or(0)
    }

    /// Make `get_thread(id)` wait until [`InMemoryForum::release_thread`]
    pub async fn hold_thread(&self, id: ThreadId) {
        self.holds.lock().await.insert(id, Arc::new(Notify::new()));
    }

    /// Let a held `get_thread(id)` complete
    pub async fn release_thread(&self, id: ThreadId) {
        if let Some(notify) = self.holds.lock().await.remove(&id) {
            notify.notify_one();
        }
    }
}

#[async_trait]
impl ForumApi for InMemoryForum {
    async fn login(&self, credentials: &Credentials) -> ClientResult<AuthToken> {
        let mut backend = self.backend.lock().await;
        backend.record("login");
        let found = backend
            .accounts
            .values()
            .find(|a| a.user.email == credentials.email && a.password == credentials.password)
            .map(|a| a.user.id);
        match found {
            Some(user_id) => Ok(backend.issue_token(user_id)),
            None => Err(rejected(400, "Invalid email or password")),
        }
    }

    async fn register(&self, registration: &Registration) -> ClientResult<AuthToken> {
        let mut backend = self.backend.lock().await;
        backend.record("register");
        if backend
            .accounts
            .values()
            .any(|a| a.user.email == registration.email)
        {
            return Err(rejected(400, "Email address already taken"));
        }
        let id = backend.allocate_id();
        backend.accounts.insert(
            id,
            Account {
                user: User {
                    id,
                    email: registration.email.clone(),
                    name: registration.name.clone(),
                    image: None,
                    admin: false,
                },
                password: registration.password.clone(),
            },
        );
        Ok(backend.issue_token(id))
    }

    async fn get_user(&self, user_id: UserId) -> ClientResult<User> {
        self.backend.lock().await.record("get_user");
        // answer on a later poll, as a real round trip would
        tokio::task::yield_now().await;

        let backend = self.backend.lock().await;
        backend.acting()?;
        backend
            .accounts
            .get(&user_id)
            .map(|a| a.user.clone())
            .ok_or_else(|| rejected(400, "Invalid user ID"))
    }

    async fn update_user(&self, update: &ProfileUpdate) -> ClientResult<()> {
        let mut backend = self.backend.lock().await;
        backend.record("update_user");
        let me = backend.acting()?;
        if let Some(email) = &update.email {
            if backend
                .accounts
                .values()
                .any(|a| a.user.id != me && &a.user.email == email)
            {
                return Err(rejected(400, "Email address already taken"));
            }
        }
        let account = backend
            .accounts
            .get_mut(&me)
            .ok_or_else(|| rejected(403, "Invalid token"))?;
        if let Some(email) = &update.email {
            account.user.email = email.clone();
        }
        if let Some(name) = &update.name {
            account.user.name = name.clone();
        }
        if let Some(password) = &update.password {
            account.password = password.clone();
        }
        if let Some(image) = &update.image {
            account.user.image = Some(image.clone());
        }
        Ok(())
    }

    async fn list_thread_ids(&self, start: usize) -> ClientResult<Vec<ThreadId>> {
        let mut backend = self.backend.lock().await;
        backend.record("list_thread_ids");
        let me = backend.acting()?;
        let mut threads: Vec<&Thread> = backend
            .threads
            .values()
            .filter(|t| backend.visible(t, me))
            .collect();
        threads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(threads
            .into_iter()
            .skip(start)
            .take(PAGE_SIZE)
            .map(|t| t.id)
            .collect())
    }

    async fn get_thread(&self, id: ThreadId) -> ClientResult<Thread> {
        let hold = self.holds.lock().await.get(&id).cloned();
        if let Some(notify) = hold {
            notify.notified().await;
        }

        let mut backend = self.backend.lock().await;
        backend.record("get_thread");
        let me = backend.acting()?;
        let thread = backend.thread(id)?;
        if !backend.visible(thread, me) {
            return Err(rejected(403, "Thread is private"));
        }
        Ok(thread.clone())
    }

    async fn create_thread(&self, thread: &NewThread) -> ClientResult<ThreadId> {
        let mut backend = self.backend.lock().await;
        backend.record("create_thread");
        let me = backend.acting()?;
        if thread.title.is_empty() || thread.content.is_empty() {
            return Err(rejected(400, "Title and content are required"));
        }
        let id = backend.allocate_id();
        let created_at = backend.tick();
        backend.threads.insert(
            id,
            Thread {
                id,
                title: thread.title.clone(),
                content: thread.content.clone(),
                is_public: thread.is_public,
                lock: false,
                creator_id: me,
                created_at,
                likes: Default::default(),
                watchees: Default::default(),
            },
        );
        Ok(id)
    }

    async fn update_thread(&self, update: &ThreadUpdate) -> ClientResult<()> {
        let mut backend = self.backend.lock().await;
        backend.record("update_thread");
        let me = backend.acting()?;
        let creator = backend.thread(update.id)?.creator_id;
        if !backend.can_moderate(me, creator) {
            return Err(rejected(403, "Not the creator of this thread"));
        }
        let thread = backend.thread_mut(update.id)?;
        thread.title = update.title.clone();
        thread.content = update.content.clone();
        thread.is_public = update.is_public;
        thread.lock = update.lock;
        Ok(())
    }

    async fn delete_thread(&self, id: ThreadId) -> ClientResult<()> {
        let mut backend = self.backend.lock().await;
        backend.record("delete_thread");
        let me = backend.acting()?;
        let creator = backend.thread(id)?.creator_id;
        if !backend.can_moderate(me, creator) {
            return Err(rejected(403, "Not the creator of this thread"));
        }
        backend.threads.remove(&id);
        backend.comments.retain(|_, c| c.thread_id != id);
        Ok(())
    }

    async fn set_thread_like(&self, id: ThreadId, on: bool) -> ClientResult<()> {
        let mut backend = self.backend.lock().await;
        backend.record("set_thread_like");
        let me = backend.acting()?;
        let thread = backend.thread_mut(id)?;
        if thread.lock {
            return Err(rejected(403, "Thread is locked"));
        }
        if on {
            thread.likes.insert(me);
        } else {
            thread.likes.remove(&me);
        }
        Ok(())
    }

    async fn set_thread_watch(&self, id: ThreadId, on: bool) -> ClientResult<()> {
        let mut backend = self.backend.lock().await;
        backend.record("set_thread_watch");
        let me = backend.acting()?;
        let thread = backend.thread_mut(id)?;
        if on {
            thread.watchees.insert(me);
        } else {
            thread.watchees.remove(&me);
        }
        Ok(())
    }

    async fn list_comments(&self, thread_id: ThreadId) -> ClientResult<Vec<Comment>> {
        let mut backend = self.backend.lock().await;
        backend.record("list_comments");
        backend.acting()?;
        backend.thread(thread_id)?;
        Ok(backend
            .comments
            .values()
            .filter(|c| c.thread_id == thread_id)
            .cloned()
            .collect())
    }

    async fn create_comment(&self, comment: &NewComment) -> ClientResult<CommentId> {
        let mut backend = self.backend.lock().await;
        backend.record("create_comment");
        let me = backend.acting()?;
        if comment.content.is_empty() {
            return Err(rejected(400, "Comment content is required"));
        }
        if backend.thread(comment.thread_id)?.lock {
            return Err(rejected(403, "Thread is locked"));
        }
        if let Some(parent) = comment.parent_comment_id {
            let same_thread = backend
                .comments
                .get(&parent)
                .is_some_and(|p| p.thread_id == comment.thread_id);
            if !same_thread {
                return Err(rejected(400, "Invalid parent comment ID"));
            }
        }
        let id = backend.allocate_id();
        let created_at = backend.tick();
        backend.comments.insert(
            id,
            Comment {
                id,
                content: comment.content.clone(),
                creator_id: me,
                thread_id: comment.thread_id,
                parent_comment_id: comment.parent_comment_id,
                created_at,
                likes: Default::default(),
            },
        );
        Ok(id)
    }

    async fn update_comment(&self, update: &CommentUpdate) -> ClientResult<()> {
        let mut backend = self.backend.lock().await;
        backend.record("update_comment");
        let me = backend.acting()?;
        let creator = backend
            .comments
            .get(&update.id)
            .map(|c| c.creator_id)
            .ok_or_else(|| rejected(400, "Invalid comment ID"))?;
        if !backend.can_moderate(me, creator) {
            return Err(rejected(403, "Not the creator of this comment"));
        }
        if let Some(comment) = backend.comments.get_mut(&update.id) {
            comment.content = update.content.clone();
        }
        Ok(())
    }

    async fn set_comment_like(&self, id: CommentId, on: bool) -> ClientResult<()> {
        let mut backend = self.backend.lock().await;
        backend.record("set_comment_like");
        let me = backend.acting()?;
        let comment = backend
            .comments
            .get_mut(&id)
            .ok_or_else(|| rejected(400, "Invalid comment ID"))?;
        if on {
            comment.likes.insert(me);
        } else {
            comment.likes.remove(&me);
        }
        Ok(())
    }
}
