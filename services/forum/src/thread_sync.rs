//! The focused thread, kept in step with the backend
//!
//! [`ThreadDetailSync`] owns the single thread on screen. Every load produces
//! a fresh immutable [`ThreadSnapshot`]; a load that finishes after the focus
//! moved elsewhere is thrown away. Like and watch toggles go through
//! `Idle -> Pending -> Reconciled | Failed`, showing the flipped value while
//! the request is in flight and the server's value once it has been re-read.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::capability::RenderPass;
use crate::comment_tree::CommentForest;
use crate::error::{ClientError, ClientResult};
use crate::gateway::ForumApi;
use crate::models::{CommentId, Thread, ThreadId, UserId};
use crate::session::SessionStore;
use crate::state::ViewPublisher;

/// Per-comment details resolved after the tree is shown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentDecor {
    pub author_image: Option<String>,
    pub can_edit: bool,
}

/// Everything known about the focused thread at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadSnapshot {
    pub thread: Thread,
    pub liked_by_user: bool,
    pub watched_by_user: bool,
    /// Viewer created the thread or is an admin
    pub can_moderate: bool,
    pub comments: CommentForest,
    pub decor: HashMap<CommentId, CommentDecor>,
}

impl ThreadSnapshot {
    pub fn id(&self) -> ThreadId {
        self.thread.id
    }

    fn value(&self, kind: ToggleKind) -> bool {
        match kind {
            ToggleKind::Like => self.liked_by_user,
            ToggleKind::Watch => self.watched_by_user,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleKind {
    Like,
    Watch,
}

/// Progress of the last like or watch toggle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TogglePhase {
    #[default]
    Idle,
    /// Request in flight; show `optimistic`
    Pending { optimistic: bool },
    /// Server accepted and the thread was re-read
    Reconciled,
    /// Request failed; the snapshot still holds the prior value
    Failed,
}

/// The focused thread as the view layer sees it
#[derive(Debug, Clone)]
pub struct FocusedThread {
    pub snapshot: Arc<ThreadSnapshot>,
    pub like: TogglePhase,
    pub watch: TogglePhase,
}

impl FocusedThread {
    fn new(snapshot: Arc<ThreadSnapshot>) -> Self {
        Self {
            snapshot,
            like: TogglePhase::Idle,
            watch: TogglePhase::Idle,
        }
    }

    pub fn phase(&self, kind: ToggleKind) -> TogglePhase {
        match kind {
            ToggleKind::Like => self.like,
            ToggleKind::Watch => self.watch,
        }
    }

    fn phase_mut(&mut self, kind: ToggleKind) -> &mut TogglePhase {
        match kind {
            ToggleKind::Like => &mut self.like,
            ToggleKind::Watch => &mut self.watch,
        }
    }

    /// Value to display for a toggle
    pub fn displayed(&self, kind: ToggleKind) -> bool {
        match self.phase(kind) {
            TogglePhase::Pending { optimistic } => optimistic,
            _ => self.snapshot.value(kind),
        }
    }

    pub fn liked(&self) -> bool {
        self.displayed(ToggleKind::Like)
    }

    pub fn watched(&self) -> bool {
        self.displayed(ToggleKind::Watch)
    }
}

#[derive(Default)]
struct DetailState {
    focused: Option<ThreadId>,
    current: Option<FocusedThread>,
}

impl DetailState {
    fn current_for(&mut self, id: ThreadId) -> Option<&mut FocusedThread> {
        self.current.as_mut().filter(|c| c.snapshot.id() == id)
    }
}

/// Source of truth for the focused-thread view
pub struct ThreadDetailSync {
    api: Arc<dyn ForumApi>,
    session: SessionStore,
    view: Arc<ViewPublisher>,
    state: Mutex<DetailState>,
}

impl ThreadDetailSync {
    pub fn new(api: Arc<dyn ForumApi>, session: SessionStore, view: Arc<ViewPublisher>) -> Self {
        Self {
            api,
            session,
            view,
            state: Mutex::new(DetailState::default()),
        }
    }

    fn publish(&self, state: &DetailState) {
        let current = state.current.clone();
        self.view.update(|view| view.focused = current);
    }

    pub async fn focused(&self) -> Option<ThreadId> {
        self.state.lock().await.focused
    }

    /// Latest snapshot with toggle phases
    pub async fn current(&self) -> Option<FocusedThread> {
        self.state.lock().await.current.clone()
    }

    /// Move the focus; results for any other thread are discarded from now on
    pub async fn focus(&self, id: ThreadId) {
        let mut state = self.state.lock().await;
        state.focused = Some(id);
        if state.current.as_ref().is_some_and(|c| c.snapshot.id() != id) {
            state.current = None;
            self.publish(&state);
        }
    }

    /// Nothing focused
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        *state = DetailState::default();
        self.publish(&state);
    }

    /// Focus `id` and load it
    pub async fn open(&self, id: ThreadId, pass: &RenderPass) -> ClientResult<Arc<ThreadSnapshot>> {
        self.focus(id).await;
        self.load_thread(id, pass).await
    }

    /// Fetch thread and comments and, if `id` is still focused, apply them
    pub async fn load_thread(
        &self,
        id: ThreadId,
        pass: &RenderPass,
    ) -> ClientResult<Arc<ThreadSnapshot>> {
        let viewer = self.session.user_id().await;
        let (thread, comments) =
            tokio::try_join!(self.api.get_thread(id), self.api.list_comments(id))?;
        let can_moderate = pass.can_moderate(thread.creator_id).await;

        let mut state = self.state.lock().await;
        if state.focused != Some(id) {
            debug!("Discarding stale load of thread {}", id);
            return Err(ClientError::Superseded);
        }

        let comments = CommentForest::build(comments, viewer);
        let previous = state.current_for(id);
        // keep resolved details for comments that are still there
        let decor: HashMap<CommentId, CommentDecor> = previous
            .map(|p| {
                p.snapshot
                    .decor
                    .iter()
                    .filter(|(cid, _)| comments.contains(**cid))
                    .map(|(cid, d)| (*cid, d.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let snapshot = Arc::new(ThreadSnapshot {
            liked_by_user: viewer.is_some_and(|v| thread.liked_by(v)),
            watched_by_user: viewer.is_some_and(|v| thread.watched_by(v)),
            can_moderate,
            comments,
            decor,
            thread,
        });

        match state.current_for(id) {
            Some(current) => current.snapshot = snapshot.clone(),
            None => state.current = Some(FocusedThread::new(snapshot.clone())),
        }
        self.publish(&state);
        debug!("Loaded thread {} with {} comments", id, snapshot.comments.len());
        Ok(snapshot)
    }

    /// Resolve author images and edit rights, publishing each as it lands
    pub async fn enrich_comments(&self, id: ThreadId, pass: &RenderPass) -> ClientResult<()> {
        let creators: Vec<(CommentId, UserId)> = {
            let mut state = self.state.lock().await;
            let Some(current) = state.current_for(id) else {
                return Err(ClientError::Superseded);
            };
            current
                .snapshot
                .comments
                .flatten()
                .into_iter()
                .map(|(_, node)| (node.id(), node.comment.creator_id))
                .collect()
        };

        let mut pending: FuturesUnordered<_> = creators
            .into_iter()
            .map(|(comment_id, creator)| async move {
                let decor = CommentDecor {
                    author_image: pass.author_image(creator).await,
                    can_edit: pass.can_moderate(creator).await,
                };
                (comment_id, decor)
            })
            .collect();

        while let Some((comment_id, decor)) = pending.next().await {
            let mut state = self.state.lock().await;
            if state.focused != Some(id) {
                return Err(ClientError::Superseded);
            }
            let Some(current) = state.current_for(id) else {
                return Err(ClientError::Superseded);
            };
            Arc::make_mut(&mut current.snapshot)
                .decor
                .insert(comment_id, decor);
            self.publish(&state);
        }
        Ok(())
    }

    /// Prior value of a toggle: from the snapshot if `id` is on screen
    async fn known_value(&self, kind: ToggleKind, id: ThreadId, viewer: UserId) -> ClientResult<bool> {
        if let Some(current) = self.state.lock().await.current_for(id) {
            return Ok(current.snapshot.value(kind));
        }
        let thread = self.api.get_thread(id).await?;
        Ok(match kind {
            ToggleKind::Like => thread.liked_by(viewer),
            ToggleKind::Watch => thread.watched_by(viewer),
        })
    }

    async fn set_phase(&self, kind: ToggleKind, id: ThreadId, phase: TogglePhase) {
        let mut state = self.state.lock().await;
        if let Some(current) = state.current_for(id) {
            *current.phase_mut(kind) = phase;
            self.publish(&state);
        }
    }

    /// Invert the viewer's like or watch on `id`, then re-read the thread
    ///
    /// Returns the value the server holds afterwards.
    pub async fn toggle(&self, kind: ToggleKind, id: ThreadId, pass: &RenderPass) -> ClientResult<bool> {
        let viewer = self
            .session
            .user_id()
            .await
            .ok_or(ClientError::NotAuthenticated)?;
        let prior = self.known_value(kind, id, viewer).await?;
        let wanted = !prior;
        self.set_phase(kind, id, TogglePhase::Pending { optimistic: wanted })
            .await;

        let sent = match kind {
            ToggleKind::Like => self.api.set_thread_like(id, wanted).await,
            ToggleKind::Watch => self.api.set_thread_watch(id, wanted).await,
        };
        if let Err(e) = sent {
            warn!("{:?} toggle on thread {} failed: {}", kind, id, e);
            self.set_phase(kind, id, TogglePhase::Failed).await;
            return Err(e);
        }

        match self.load_thread(id, pass).await {
            Ok(snapshot) => {
                self.set_phase(kind, id, TogglePhase::Reconciled).await;
                info!("{:?} on thread {} is now {}", kind, id, snapshot.value(kind));
                Ok(snapshot.value(kind))
            }
            Err(ClientError::Superseded) => Ok(wanted),
            Err(e) => {
                self.set_phase(kind, id, TogglePhase::Failed).await;
                Err(e)
            }
        }
    }

    pub async fn toggle_like(&self, id: ThreadId, pass: &RenderPass) -> ClientResult<bool> {
        self.toggle(ToggleKind::Like, id, pass).await
    }

    pub async fn toggle_watch(&self, id: ThreadId, pass: &RenderPass) -> ClientResult<bool> {
        self.toggle(ToggleKind::Watch, id, pass).await
    }

    /// Invert the viewer's like on a comment of the focused thread
    pub async fn toggle_comment_like(
        &self,
        comment_id: CommentId,
        pass: &RenderPass,
    ) -> ClientResult<bool> {
        self.session
            .user_id()
            .await
            .ok_or(ClientError::NotAuthenticated)?;
        let (thread_id, prior) = {
            let state = self.state.lock().await;
            let current = state
                .current
                .as_ref()
                .ok_or_else(|| ClientError::validation("No thread is open"))?;
            let node = current
                .snapshot
                .comments
                .find(comment_id)
                .ok_or_else(|| ClientError::validation(format!("No comment {} here", comment_id)))?;
            (current.snapshot.id(), node.liked_by_user)
        };

        self.api.set_comment_like(comment_id, !prior).await?;
        let snapshot = self.load_thread(thread_id, pass).await?;
        Ok(snapshot
            .comments
            .find(comment_id)
            .is_some_and(|node| node.liked_by_user))
    }
}
