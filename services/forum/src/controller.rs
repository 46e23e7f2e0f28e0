//! Turns intents into backend calls and view-state updates
//!
//! The controller never renders. It runs one [`Intent`] at a time against the
//! backend, lets the cursor and the detail sync recompute their state, and
//! publishes the result through the shared [`ViewPublisher`]. A failed intent
//! becomes an error [`Notice`]; nothing is retried.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{error, info, warn};

use crate::capability::RenderPass;
use crate::cursor::ThreadListCursor;
use crate::error::{ClientError, ClientResult};
use crate::gateway::ForumApi;
use crate::intent::{Intent, ProfileDraft};
use crate::media;
use crate::models::{
    AuthToken, CommentUpdate, NewComment, NewThread, ProfileUpdate, Thread, ThreadId,
    ThreadUpdate, UserId,
};
use crate::session::SessionStore;
use crate::state::{Notice, ProfileView, ViewPublisher, ViewState};
use crate::thread_sync::ThreadDetailSync;

pub struct ViewController {
    api: Arc<dyn ForumApi>,
    session: SessionStore,
    view: Arc<ViewPublisher>,
    cursor: Mutex<ThreadListCursor>,
    detail: ThreadDetailSync,
}

impl ViewController {
    pub fn new(api: Arc<dyn ForumApi>, session: SessionStore) -> Self {
        let view = Arc::new(ViewPublisher::new());
        Self {
            cursor: Mutex::new(ThreadListCursor::new(api.clone(), session.clone())),
            detail: ThreadDetailSync::new(api.clone(), session.clone(), view.clone()),
            api,
            session,
            view,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view.subscribe()
    }

    /// Copy of what is on screen now
    pub fn state(&self) -> ViewState {
        self.view.current()
    }

    pub fn detail(&self) -> &ThreadDetailSync {
        &self.detail
    }

    async fn render_pass(&self) -> RenderPass {
        RenderPass::new(self.api.clone(), self.session.user_id().await)
    }

    /// Show the thread list of a restored session, if there is one
    pub async fn start(&self) -> ClientResult<()> {
        let Some(user_id) = self.session.user_id().await else {
            return Ok(());
        };
        self.view.update(|state| state.user_id = Some(user_id));
        self.dispatch(Intent::LoadMoreThreads).await
    }

    /// Run one intent, turning a failure into an error notice
    pub async fn dispatch(&self, intent: Intent) -> ClientResult<()> {
        if intent.requires_session() && !self.session.is_authenticated().await {
            let err = ClientError::NotAuthenticated;
            self.view.notify(Notice::error(err.to_string()));
            return Err(err);
        }

        let result = self.apply(intent).await;
        if let Err(e) = &result {
            if e.is_user_visible() {
                warn!("Action failed: {}", e);
                self.view.notify(Notice::error(e.to_string()));
            }
        }
        result
    }

    async fn apply(&self, intent: Intent) -> ClientResult<()> {
        match intent {
            Intent::Login(credentials) => {
                let auth = self.api.login(&credentials).await?;
                self.signed_in(auth, &credentials.password).await
            }
            Intent::Register(registration) => {
                let auth = self.api.register(&registration).await?;
                self.signed_in(auth, &registration.password).await
            }
            Intent::Logout => self.logout().await,
            Intent::LoadMoreThreads => self.load_more().await,
            Intent::OpenThread(id) => self.open_thread(id).await,
            Intent::CreateThread(thread) => self.create_thread(thread).await,
            Intent::EditThread(update) => self.edit_thread(update).await,
            Intent::DeleteThread(id) => self.delete_thread(id).await,
            Intent::ToggleThreadLike(id) => {
                let pass = self.render_pass().await;
                self.detail.toggle_like(id, &pass).await?;
                self.refresh_listed(id).await;
                Ok(())
            }
            Intent::ToggleThreadWatch(id) => {
                let pass = self.render_pass().await;
                self.detail.toggle_watch(id, &pass).await?;
                self.refresh_listed(id).await;
                Ok(())
            }
            Intent::PostComment(comment) => self.post_comment(comment).await,
            Intent::EditComment(update) => self.edit_comment(update).await,
            Intent::ToggleCommentLike(id) => {
                let pass = self.render_pass().await;
                self.detail.toggle_comment_like(id, &pass).await?;
                Ok(())
            }
            Intent::ShowProfile => self.show_profile().await,
            Intent::UpdateProfile(draft) => self.update_profile(draft).await,
        }
    }

    async fn signed_in(&self, auth: AuthToken, password: &str) -> ClientResult<()> {
        self.session.login(&auth.token, auth.user_id).await?;
        self.session.remember_password(password).await;
        self.detail.clear().await;
        self.view.clear();
        self.view.update(|state| state.user_id = Some(auth.user_id));
        info!("Signed in as user {}", auth.user_id);

        self.reload_threads().await?;
        self.view.notify(Notice::info("Signed in"));
        Ok(())
    }

    async fn logout(&self) -> ClientResult<()> {
        self.session.logout().await?;
        self.cursor.lock().await.reset();
        self.detail.clear().await;
        self.view.clear();
        self.view.notify(Notice::info("Signed out"));
        Ok(())
    }

    /// Append the next page of threads to the list
    async fn load_more(&self) -> ClientResult<()> {
        let page = self.cursor.lock().await.load_page().await?;
        self.view.update(|state| {
            let mut threads = state.threads.as_ref().clone();
            threads.extend(page.threads);
            state.threads = Arc::new(threads);
            state.has_more = page.has_more;
        });
        Ok(())
    }

    /// Start the list over and load its first page
    async fn reload_threads(&self) -> ClientResult<Vec<ThreadId>> {
        let page = {
            let mut cursor = self.cursor.lock().await;
            cursor.reset();
            cursor.load_page().await?
        };
        let ids = page.threads.iter().map(|t| t.id).collect();
        self.view.update(|state| {
            state.threads = Arc::new(page.threads);
            state.has_more = page.has_more;
        });
        Ok(ids)
    }

    /// Replace a listed thread with the focused snapshot's copy
    async fn refresh_listed(&self, id: ThreadId) {
        let Some(focused) = self.detail.current().await else {
            return;
        };
        if focused.snapshot.id() != id {
            return;
        }
        let fresh: Thread = focused.snapshot.thread.clone();
        self.view.update(|state| {
            if state.threads.iter().any(|t| t.id == id) {
                let threads = state
                    .threads
                    .iter()
                    .map(|t| if t.id == id { fresh.clone() } else { t.clone() })
                    .collect();
                state.threads = Arc::new(threads);
            }
        });
    }

    async fn open_thread(&self, id: ThreadId) -> ClientResult<()> {
        let pass = self.render_pass().await;
        self.detail.open(id, &pass).await?;
        self.detail.enrich_comments(id, &pass).await
    }

    async fn refresh_thread(&self, id: ThreadId) -> ClientResult<()> {
        let pass = self.render_pass().await;
        self.detail.load_thread(id, &pass).await?;
        self.detail.enrich_comments(id, &pass).await
    }

    async fn create_thread(&self, thread: NewThread) -> ClientResult<()> {
        let id = self.api.create_thread(&thread).await?;
        info!("Created thread {}", id);
        self.reload_threads().await?;
        self.open_thread(id).await?;
        self.view.notify(Notice::info("Thread created"));
        Ok(())
    }

    /// Viewer may edit or delete thread `id`; the open snapshot answers when it is that thread
    async fn can_moderate_thread(&self, id: ThreadId) -> ClientResult<bool> {
        if let Some(current) = self.detail.current().await.filter(|c| c.snapshot.id() == id) {
            return Ok(current.snapshot.can_moderate);
        }
        let thread = self.api.get_thread(id).await?;
        Ok(self.render_pass().await.can_moderate(thread.creator_id).await)
    }

    async fn edit_thread(&self, update: ThreadUpdate) -> ClientResult<()> {
        if !self.can_moderate_thread(update.id).await? {
            return Err(ClientError::validation("You cannot edit this thread"));
        }
        self.api.update_thread(&update).await?;
        self.reload_threads().await?;
        self.open_thread(update.id).await?;
        self.view.notify(Notice::info("Thread updated"));
        Ok(())
    }

    /// Delete, then show the newest remaining thread or nothing
    async fn delete_thread(&self, id: ThreadId) -> ClientResult<()> {
        if !self.can_moderate_thread(id).await? {
            return Err(ClientError::validation("You cannot delete this thread"));
        }
        self.api.delete_thread(id).await?;
        info!("Deleted thread {}", id);
        let ids = self.reload_threads().await?;
        match ids.first() {
            Some(first) => self.open_thread(*first).await?,
            None => self.detail.clear().await,
        }
        self.view.notify(Notice::info("Thread deleted"));
        Ok(())
    }

    async fn post_comment(&self, comment: NewComment) -> ClientResult<()> {
        let id = self.api.create_comment(&comment).await?;
        info!("Posted comment {} on thread {}", id, comment.thread_id);
        if self.detail.focused().await == Some(comment.thread_id) {
            self.refresh_thread(comment.thread_id).await?;
        }
        Ok(())
    }

    async fn edit_comment(&self, update: CommentUpdate) -> ClientResult<()> {
        let focused = self
            .detail
            .current()
            .await
            .ok_or_else(|| ClientError::validation("No thread is open"))?;
        let creator = focused
            .snapshot
            .comments
            .find(update.id)
            .map(|node| node.comment.creator_id)
            .ok_or_else(|| ClientError::validation(format!("No comment {} here", update.id)))?;
        if !self.render_pass().await.can_moderate(creator).await {
            return Err(ClientError::validation("You cannot edit this comment"));
        }

        self.api.update_comment(&update).await?;
        self.refresh_thread(focused.snapshot.id()).await
    }

    async fn me(&self) -> ClientResult<UserId> {
        self.session
            .user_id()
            .await
            .ok_or(ClientError::NotAuthenticated)
    }

    async fn show_profile(&self) -> ClientResult<()> {
        let me = self.me().await?;
        let user = self.api.get_user(me).await?;
        let password = self.session.current_password().await;
        self.view
            .update(|state| state.profile = Some(ProfileView { user, password }));
        Ok(())
    }

    /// Fetch the current profile, overlay the draft and send the whole record
    async fn update_profile(&self, draft: ProfileDraft) -> ClientResult<()> {
        let me = self.me().await?;
        let current = self.api.get_user(me).await?;

        let image = match &draft.image_path {
            Some(path) => Some(media::image_data_url(path).await?),
            None => current.image.clone(),
        };
        let password = match draft.password.clone() {
            Some(password) => Some(password),
            None => self.session.current_password().await,
        };

        let update = ProfileUpdate {
            email: Some(draft.email.unwrap_or(current.email)),
            password,
            name: Some(draft.name.unwrap_or(current.name)),
            image,
        };
        if let Err(e) = self.api.update_user(&update).await {
            error!("Profile update for user {} failed: {}", me, e);
            return Err(e);
        }

        if let Some(password) = &draft.password {
            self.session.remember_password(password).await;
        }
        self.show_profile().await?;
        self.view.notify(Notice::info("Profile updated"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::NoticeLevel;
    use crate::testing::InMemoryForum;

    async fn signed_in(forum: &Arc<InMemoryForum>) -> (ViewController, UserId) {
        let user = forum.seed_user("a@b.com", "Ann", "pw", false).await;
        let controller = ViewController::new(forum.clone(), SessionStore::in_memory());
        controller
            .dispatch(Intent::login("a@b.com", "pw").unwrap())
            .await
            .unwrap();
        (controller, user)
    }

    fn listed(state: &ViewState) -> Vec<ThreadId> {
        state.threads.iter().map(|t| t.id).collect()
    }

    #[tokio::test]
    async fn test_login_loads_first_page() {
        let forum = Arc::new(InMemoryForum::new());
        let owner = forum.seed_user("o@b.com", "Owner", "pw", false).await;
        for n in 0..6 {
            forum.seed_thread(owner, &format!("t{}", n), "body").await;
        }
        let (controller, user) = signed_in(&forum).await;

        let state = controller.state();
        assert_eq!(state.user_id, Some(user));
        assert_eq!(state.threads.len(), 5);
        assert!(state.has_more);

        controller.dispatch(Intent::LoadMoreThreads).await.unwrap();
        let state = controller.state();
        assert_eq!(state.threads.len(), 6);
        assert!(!state.has_more);
    }

    #[tokio::test]
    async fn test_bad_login_becomes_notice() {
        let forum = Arc::new(InMemoryForum::new());
        forum.seed_user("a@b.com", "Ann", "pw", false).await;
        let controller = ViewController::new(forum, SessionStore::in_memory());

        let err = controller
            .dispatch(Intent::login("a@b.com", "wrong").unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(400));
        let notice = controller.state().notice.unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.contains("Invalid email or password"));
    }

    #[tokio::test]
    async fn test_intents_need_a_session() {
        let forum = Arc::new(InMemoryForum::new());
        let controller = ViewController::new(forum.clone(), SessionStore::in_memory());

        let err = controller.dispatch(Intent::LoadMoreThreads).await.unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));
        assert_eq!(forum.calls("list_thread_ids").await, 0);
    }

    #[tokio::test]
    async fn test_register_signs_in() {
        let forum = Arc::new(InMemoryForum::new());
        let controller = ViewController::new(forum, SessionStore::in_memory());

        controller
            .dispatch(Intent::register("new@b.com", "New", "pw", "pw").unwrap())
            .await
            .unwrap();

        assert!(controller.state().is_signed_in());
    }

    #[tokio::test]
    async fn test_create_thread_resets_list_and_focuses_it() {
        let forum = Arc::new(InMemoryForum::new());
        let (controller, _) = signed_in(&forum).await;

        controller
            .dispatch(Intent::create_thread("Hello", "world", true).unwrap())
            .await
            .unwrap();

        let state = controller.state();
        let focused = state.focused.unwrap();
        assert_eq!(focused.snapshot.thread.title, "Hello");
        assert_eq!(listed(&controller.state()), vec![focused.snapshot.id()]);
    }

    #[tokio::test]
    async fn test_edit_thread_refreshes_focus() {
        let forum = Arc::new(InMemoryForum::new());
        let (controller, user) = signed_in(&forum).await;
        let id = forum.seed_thread(user, "Old", "body").await;

        controller
            .dispatch(Intent::edit_thread(id, "New", "body", true, true).unwrap())
            .await
            .unwrap();

        let focused = controller.state().focused.unwrap();
        assert_eq!(focused.snapshot.thread.title, "New");
        assert!(focused.snapshot.thread.lock);
    }

    #[tokio::test]
    async fn test_thread_edit_and_delete_require_rights() {
        let forum = Arc::new(InMemoryForum::new());
        let (controller, _user) = signed_in(&forum).await;
        let other = forum.seed_user("o@b.com", "Other", "pw", false).await;
        let theirs = forum.seed_thread(other, "Theirs", "body").await;

        let err = controller
            .dispatch(Intent::edit_thread(theirs, "Mine now", "body", true, false).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        let err = controller
            .dispatch(Intent::DeleteThread(theirs))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        // same answer when the thread is the one on screen
        controller.dispatch(Intent::OpenThread(theirs)).await.unwrap();
        let err = controller
            .dispatch(Intent::DeleteThread(theirs))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        assert_eq!(forum.calls("update_thread").await, 0);
        assert_eq!(forum.calls("delete_thread").await, 0);
        assert_eq!(forum.thread(theirs).await.unwrap().title, "Theirs");
    }

    #[tokio::test]
    async fn test_admin_deletes_others_threads() {
        let forum = Arc::new(InMemoryForum::new());
        let admin = forum.seed_user("root@b.com", "Root", "pw", true).await;
        let other = forum.seed_user("o@b.com", "Other", "pw", false).await;
        let theirs = forum.seed_thread(other, "Theirs", "body").await;
        let controller = ViewController::new(forum.clone(), SessionStore::in_memory());
        controller
            .dispatch(Intent::login("root@b.com", "pw").unwrap())
            .await
            .unwrap();
        assert_eq!(controller.me().await.unwrap(), admin);

        controller.dispatch(Intent::DeleteThread(theirs)).await.unwrap();

        assert!(forum.thread(theirs).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_focused_thread_focuses_first_of_fresh_page() {
        let forum = Arc::new(InMemoryForum::new());
        let (controller, user) = signed_in(&forum).await;
        let older = forum.seed_thread(user, "older", "body").await;
        let newer = forum.seed_thread(user, "newer", "body").await;
        controller.dispatch(Intent::OpenThread(newer)).await.unwrap();

        controller.dispatch(Intent::DeleteThread(newer)).await.unwrap();

        let state = controller.state();
        assert_eq!(listed(&state), vec![older]);
        assert_eq!(state.focused.unwrap().snapshot.id(), older);
        assert!(forum.thread(newer).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_last_thread_leaves_empty_state() {
        let forum = Arc::new(InMemoryForum::new());
        let (controller, user) = signed_in(&forum).await;
        let only = forum.seed_thread(user, "only", "body").await;
        controller.dispatch(Intent::OpenThread(only)).await.unwrap();

        controller.dispatch(Intent::DeleteThread(only)).await.unwrap();

        let state = controller.state();
        assert!(state.threads.is_empty());
        assert!(state.focused.is_none());
        assert_eq!(controller.detail().focused().await, None);
    }

    #[tokio::test]
    async fn test_posted_comment_shows_up_under_parent() {
        let forum = Arc::new(InMemoryForum::new());
        let (controller, user) = signed_in(&forum).await;
        let id = forum.seed_thread(user, "Hello", "world").await;
        let parent = forum.seed_comment(id, user, "first", None).await;
        controller.dispatch(Intent::OpenThread(id)).await.unwrap();

        controller
            .dispatch(Intent::reply(id, parent, "second").unwrap())
            .await
            .unwrap();

        let comments = forum.list_comments(id).await.unwrap();
        let reply = comments.iter().find(|c| c.content == "second").unwrap();
        assert_eq!(reply.parent_comment_id, Some(parent));

        let focused = controller.state().focused.unwrap();
        let forest = &focused.snapshot.comments;
        let parent_node = forest.find(parent).unwrap();
        let first_reply = forest.children(parent_node).next().unwrap();
        assert_eq!(first_reply.comment.content, "second");
        assert!(focused.snapshot.decor[&reply.id].can_edit);
    }

    #[tokio::test]
    async fn test_edit_comment_requires_rights() {
        let forum = Arc::new(InMemoryForum::new());
        let (controller, user) = signed_in(&forum).await;
        let other = forum.seed_user("o@b.com", "Other", "pw", false).await;
        let id = forum.seed_thread(user, "Hello", "world").await;
        let theirs = forum.seed_comment(id, other, "theirs", None).await;
        let mine = forum.seed_comment(id, user, "mine", None).await;
        controller.dispatch(Intent::OpenThread(id)).await.unwrap();

        let err = controller
            .dispatch(Intent::edit_comment(theirs, "changed").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(forum.calls("update_comment").await, 0);

        controller
            .dispatch(Intent::edit_comment(mine, "changed").unwrap())
            .await
            .unwrap();
        let focused = controller.state().focused.unwrap();
        assert_eq!(focused.snapshot.comments.find(mine).unwrap().comment.content, "changed");
    }

    #[tokio::test]
    async fn test_like_updates_listed_thread() {
        let forum = Arc::new(InMemoryForum::new());
        let user = forum.seed_user("a@b.com", "Ann", "pw", false).await;
        let id = forum.seed_thread(user, "Hello", "world").await;
        let controller = ViewController::new(forum.clone(), SessionStore::in_memory());
        controller
            .dispatch(Intent::login("a@b.com", "pw").unwrap())
            .await
            .unwrap();
        controller.dispatch(Intent::OpenThread(id)).await.unwrap();

        controller.dispatch(Intent::ToggleThreadLike(id)).await.unwrap();

        let state = controller.state();
        assert!(state.focused.unwrap().liked());
        assert!(state.threads[0].likes.contains(&user));
    }

    #[tokio::test]
    async fn test_logout_clears_view_and_password() {
        let forum = Arc::new(InMemoryForum::new());
        let (controller, _) = signed_in(&forum).await;

        controller.dispatch(Intent::Logout).await.unwrap();

        let state = controller.state();
        assert!(!state.is_signed_in());
        assert!(state.threads.is_empty());
        assert!(state.profile.is_none());
    }

    #[tokio::test]
    async fn test_profile_prefills_login_password() {
        let forum = Arc::new(InMemoryForum::new());
        let (controller, user) = signed_in(&forum).await;

        controller.dispatch(Intent::ShowProfile).await.unwrap();

        let profile = controller.state().profile.unwrap();
        assert_eq!(profile.user.id, user);
        assert_eq!(profile.password.as_deref(), Some("pw"));
    }

    #[tokio::test]
    async fn test_profile_update_keeps_image_without_new_file() {
        let forum = Arc::new(InMemoryForum::new());
        let (controller, user) = signed_in(&forum).await;
        forum.set_image(user, "data:image/png;base64,AA==").await;

        controller
            .dispatch(
                Intent::update_profile(ProfileDraft {
                    name: Some("Annie".to_string()),
                    ..Default::default()
                })
                .unwrap(),
            )
            .await
            .unwrap();

        let profile = controller.state().profile.unwrap();
        assert_eq!(profile.user.name, "Annie");
        assert_eq!(profile.user.email, "a@b.com");
        assert_eq!(profile.user.image.as_deref(), Some("data:image/png;base64,AA=="));

        // the cached password went along, so logging in again still works
        controller.dispatch(Intent::Logout).await.unwrap();
        controller
            .dispatch(Intent::login("a@b.com", "pw").unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_restored_session_starts_with_threads() {
        let forum = Arc::new(InMemoryForum::new());
        let user = forum.seed_user("a@b.com", "Ann", "pw", false).await;
        forum.seed_thread(user, "Hello", "world").await;
        forum.act_as(Some(user)).await;
        let session = SessionStore::in_memory();
        session.login("token", user).await.unwrap();

        let controller = ViewController::new(forum, session);
        controller.start().await.unwrap();

        let state = controller.state();
        assert_eq!(state.user_id, Some(user));
        assert_eq!(state.threads.len(), 1);
    }
}
