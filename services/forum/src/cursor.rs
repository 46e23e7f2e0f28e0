//! Paginated iteration over the thread list
//!
//! The backend hands out thread ids five at a time from an offset. The cursor
//! keeps that offset, follows the session's login epoch (a login or logout
//! starts the list over) and never yields the same id twice within an epoch.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};
use crate::gateway::ForumApi;
use crate::models::{Thread, ThreadId};
use crate::session::SessionStore;

/// Number of thread ids the backend returns per page
pub const PAGE_SIZE: usize = 5;

/// One page of thread ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadPage {
    pub ids: Vec<ThreadId>,
    /// The backend returned a full page; more may follow
    pub has_more: bool,
}

/// One page of threads with their details
#[derive(Debug, Clone)]
pub struct ThreadListPage {
    pub threads: Vec<Thread>,
    pub has_more: bool,
}

/// Offset-based cursor over `GET /threads`
pub struct ThreadListCursor {
    api: Arc<dyn ForumApi>,
    session: SessionStore,
    offset: usize,
    epoch: u64,
    seen: HashSet<ThreadId>,
}

impl ThreadListCursor {
    pub fn new(api: Arc<dyn ForumApi>, session: SessionStore) -> Self {
        let epoch = session.epoch();
        Self {
            api,
            session,
            offset: 0,
            epoch,
            seen: HashSet::new(),
        }
    }

    /// Offset the next request will start from
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Start over from the first page
    pub fn reset(&mut self) {
        debug!("Resetting thread cursor at offset {}", self.offset);
        self.offset = 0;
        self.seen.clear();
    }

    fn follow_session(&mut self) {
        let epoch = self.session.epoch();
        if epoch != self.epoch {
            info!("Session changed, thread list starts over");
            self.reset();
            self.epoch = epoch;
        }
    }

    /// Session changed while a request was in flight
    fn ensure_same_epoch(&self) -> ClientResult<()> {
        if self.session.epoch() != self.epoch {
            return Err(ClientError::Superseded);
        }
        Ok(())
    }

    /// Drop ids already handed out in this epoch, and repeats within the page
    fn unseen(&self, ids: &[ThreadId]) -> Vec<ThreadId> {
        let mut fresh = Vec::with_capacity(ids.len());
        for id in ids {
            if !self.seen.contains(id) && !fresh.contains(id) {
                fresh.push(*id);
            }
        }
        fresh
    }

    fn commit(&mut self, returned: usize, ids: &[ThreadId]) {
        self.offset += returned;
        self.seen.extend(ids.iter().copied());
    }

    /// Fetch the next page of ids and advance the offset
    ///
    /// The offset moves by the number of ids the backend returned, duplicates
    /// included; only the duplicates are withheld from the caller.
    pub async fn next_page(&mut self) -> ClientResult<ThreadPage> {
        self.follow_session();
        let raw = self.api.list_thread_ids(self.offset).await?;
        self.ensure_same_epoch()?;

        let has_more = raw.len() >= PAGE_SIZE;
        let ids = self.unseen(&raw);
        self.commit(raw.len(), &ids);
        debug!(
            "Thread page: {} ids, offset now {}, has_more={}",
            ids.len(),
            self.offset,
            has_more
        );
        Ok(ThreadPage { ids, has_more })
    }

    /// Fetch the next page of ids together with every thread's details
    ///
    /// Details are requested concurrently. The offset only moves once all of
    /// them have arrived; if any fails, nothing is committed and the same page
    /// is requested again next time.
    pub async fn load_page(&mut self) -> ClientResult<ThreadListPage> {
        self.follow_session();
        let raw = self.api.list_thread_ids(self.offset).await?;
        let has_more = raw.len() >= PAGE_SIZE;
        let ids = self.unseen(&raw);

        let api = &self.api;
        let threads = try_join_all(ids.iter().map(|id| api.get_thread(*id))).await?;
        self.ensure_same_epoch()?;

        self.commit(raw.len(), &ids);
        debug!(
            "Loaded {} threads, offset now {}, has_more={}",
            threads.len(),
            self.offset,
            has_more
        );
        Ok(ThreadListPage { threads, has_more })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockForumApi;
    use crate::testing::InMemoryForum;

    async fn forum_with_threads(count: usize) -> (Arc<InMemoryForum>, Vec<ThreadId>) {
        let forum = Arc::new(InMemoryForum::new());
        let user = forum.seed_user("a@b.com", "Ann", "pw", false).await;
        let mut ids = Vec::new();
        for n in 0..count {
            ids.push(forum.seed_thread(user, &format!("t{}", n), "body").await);
        }
        forum.act_as(Some(user)).await;
        ids.reverse();
        (forum, ids)
    }

    #[tokio::test]
    async fn test_full_page_reports_more() {
        let mut api = MockForumApi::new();
        api.expect_list_thread_ids()
            .returning(|_| Ok(vec![1, 2, 3, 4, 5]));
        let mut cursor = ThreadListCursor::new(Arc::new(api), SessionStore::in_memory());

        let page = cursor.next_page().await.unwrap();
        assert!(page.has_more);
        assert_eq!(cursor.offset(), 5);
    }

    #[tokio::test]
    async fn test_short_page_reports_no_more() {
        let mut api = MockForumApi::new();
        api.expect_list_thread_ids().returning(|_| Ok(vec![1, 2, 3]));
        let mut cursor = ThreadListCursor::new(Arc::new(api), SessionStore::in_memory());

        let page = cursor.next_page().await.unwrap();
        assert!(!page.has_more);
        assert_eq!(page.ids, vec![1, 2, 3]);
        assert_eq!(cursor.offset(), 3);
    }

    #[tokio::test]
    async fn test_pages_never_repeat_an_id() {
        let (forum, expected) = forum_with_threads(12).await;
        let mut cursor = ThreadListCursor::new(forum, SessionStore::in_memory());

        let mut all = Vec::new();
        loop {
            let page = cursor.next_page().await.unwrap();
            all.extend(page.ids);
            if !page.has_more {
                break;
            }
        }
        assert_eq!(all, expected);
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
    }

    #[tokio::test]
    async fn test_overlapping_pages_are_filtered() {
        let mut api = MockForumApi::new();
        api.expect_list_thread_ids()
            .withf(|start| *start == 0)
            .returning(|_| Ok(vec![9, 8, 7, 6, 5]));
        api.expect_list_thread_ids()
            .withf(|start| *start == 5)
            .returning(|_| Ok(vec![5, 4]));
        let mut cursor = ThreadListCursor::new(Arc::new(api), SessionStore::in_memory());

        cursor.next_page().await.unwrap();
        let second = cursor.next_page().await.unwrap();
        assert_eq!(second.ids, vec![4]);
        assert_eq!(cursor.offset(), 7);
    }

    #[tokio::test]
    async fn test_reset_starts_from_zero() {
        let (forum, expected) = forum_with_threads(7).await;
        let mut cursor = ThreadListCursor::new(forum, SessionStore::in_memory());

        cursor.next_page().await.unwrap();
        cursor.reset();
        assert_eq!(cursor.offset(), 0);
        let page = cursor.next_page().await.unwrap();
        assert_eq!(page.ids, expected[..5].to_vec());
    }

    #[tokio::test]
    async fn test_logout_restarts_the_list() {
        let (forum, expected) = forum_with_threads(7).await;
        let session = SessionStore::in_memory();
        session.login("t", 1).await.unwrap();
        let mut cursor = ThreadListCursor::new(forum, session.clone());

        cursor.next_page().await.unwrap();
        session.logout().await.unwrap();
        session.login("t", 1).await.unwrap();

        let page = cursor.next_page().await.unwrap();
        assert_eq!(page.ids, expected[..5].to_vec());
        assert_eq!(cursor.offset(), 5);
    }

    #[tokio::test]
    async fn test_load_page_joins_details_before_advancing() {
        let (forum, expected) = forum_with_threads(3).await;
        let mut cursor = ThreadListCursor::new(forum.clone(), SessionStore::in_memory());

        let page = cursor.load_page().await.unwrap();
        let ids: Vec<_> = page.threads.iter().map(|t| t.id).collect();
        assert_eq!(ids, expected);
        assert!(!page.has_more);
        assert_eq!(cursor.offset(), 3);
        assert_eq!(forum.calls("get_thread").await, 3);
    }

    #[tokio::test]
    async fn test_failed_detail_keeps_offset() {
        let mut api = MockForumApi::new();
        api.expect_list_thread_ids().returning(|_| Ok(vec![1, 2]));
        api.expect_get_thread().returning(|id| {
            Err(ClientError::Http {
                status: 400,
                message: format!("Invalid thread ID {}", id),
            })
        });
        let mut cursor = ThreadListCursor::new(Arc::new(api), SessionStore::in_memory());

        assert!(cursor.load_page().await.is_err());
        assert_eq!(cursor.offset(), 0);
    }
}
