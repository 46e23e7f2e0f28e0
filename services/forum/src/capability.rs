//! Per-render lookups: moderation rights and author images
//!
//! A [`RenderPass`] lives for one rendering of a thread. The viewer's admin
//! flag is fetched at most once during it, and each author's profile image at
//! most once, however many comments they wrote.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use crate::gateway::ForumApi;
use crate::models::UserId;

pub struct RenderPass {
    api: Arc<dyn ForumApi>,
    viewer: Option<UserId>,
    admin: OnceCell<bool>,
    // one slot per author; concurrent lookups of the same author share it
    images: Mutex<HashMap<UserId, Arc<OnceCell<Option<String>>>>>,
}

impl RenderPass {
    pub fn new(api: Arc<dyn ForumApi>, viewer: Option<UserId>) -> Self {
        Self {
            api,
            viewer,
            admin: OnceCell::new(),
            images: Mutex::new(HashMap::new()),
        }
    }

    pub fn viewer(&self) -> Option<UserId> {
        self.viewer
    }

    /// Whether the viewer is an admin; a failed lookup counts as no
    async fn viewer_is_admin(&self) -> bool {
        let Some(viewer) = self.viewer else {
            return false;
        };
        *self
            .admin
            .get_or_init(|| async {
                match self.api.get_user(viewer).await {
                    Ok(user) => user.admin,
                    Err(e) => {
                        warn!("Could not fetch admin flag for user {}: {}", viewer, e);
                        false
                    }
                }
            })
            .await
    }

    /// Viewer may edit or delete content created by `creator`
    pub async fn can_moderate(&self, creator: UserId) -> bool {
        match self.viewer {
            None => false,
            Some(viewer) if viewer == creator => true,
            Some(_) => self.viewer_is_admin().await,
        }
    }

    /// Profile image of `user`, or `None` when unset or the lookup fails
    pub async fn author_image(&self, user: UserId) -> Option<String> {
        let slot = self
            .images
            .lock()
            .await
            .entry(user)
            .or_default()
            .clone();

        slot.get_or_init(|| async {
            match self.api.get_user(user).await {
                Ok(profile) => profile.image.filter(|i| !i.is_empty()),
                Err(e) => {
                    debug!("No image for user {}: {}", user, e);
                    None
                }
            }
        })
        .await
        .clone()
    }
}
