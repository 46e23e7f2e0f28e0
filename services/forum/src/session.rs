//! Session management backed by a key-value store
//!
//! The token and user id are persisted under the `TOKEN` and `USER_ID` keys so
//! a later process can pick the session up again. The plaintext password of
//! the last login is kept in memory only, for pre-filling the profile editor.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use common::store::{KeyValueStore, MemoryStore};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::ClientResult;
use crate::models::UserId;

/// Store key holding the bearer token
pub const TOKEN_KEY: &str = "TOKEN";
/// Store key holding the signed-in user id
pub const USER_ID_KEY: &str = "USER_ID";

#[derive(Default)]
struct SessionState {
    token: Option<String>,
    user_id: Option<UserId>,
    password: Option<SecretString>,
}

/// Process-wide session handle; clones share the same state
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<RwLock<SessionState>>,
    store: Arc<dyn KeyValueStore>,
    epoch: Arc<AtomicU64>,
}

impl SessionStore {
    /// Create a new session store persisting into `store`
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::default())),
            store,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a session store that forgets everything on exit
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Load a previously persisted session, returning whether one was found
    pub async fn restore(&self) -> ClientResult<bool> {
        let token = self.store.get(TOKEN_KEY).await?;
        let user_id = self.store.get(USER_ID_KEY).await?;

        let (token, user_id) = match (token, user_id) {
            (Some(token), Some(raw)) => match raw.parse::<UserId>() {
                Ok(user_id) => (token, user_id),
                Err(_) => {
                    warn!("Ignoring persisted session with invalid user id {:?}", raw);
                    return Ok(false);
                }
            },
            _ => return Ok(false),
        };

        info!("Restored session for user: {}", user_id);
        let mut state = self.state.write().await;
        state.token = Some(token);
        state.user_id = Some(user_id);
        state.password = None;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    /// Record a successful login and persist the token and user id
    pub async fn login(&self, token: &str, user_id: UserId) -> ClientResult<()> {
        info!("Creating session for user: {}", user_id);

        self.store.set(TOKEN_KEY, token).await?;
        self.store.set(USER_ID_KEY, &user_id.to_string()).await?;

        let mut state = self.state.write().await;
        state.token = Some(token.to_string());
        state.user_id = Some(user_id);
        state.password = None;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Keep the plaintext password of the current login in memory
    pub async fn remember_password(&self, password: &str) {
        self.state.write().await.password = Some(SecretString::from(password.to_string()));
    }

    /// Clear token, user id and password, here and in the persisted store
    ///
    /// Bumping the epoch makes any thread-list cursor start over.
    pub async fn logout(&self) -> ClientResult<()> {
        let previous = {
            let mut state = self.state.write().await;
            let previous = state.user_id;
            *state = SessionState::default();
            previous
        };
        self.epoch.fetch_add(1, Ordering::SeqCst);
        info!("Deleting session for user: {:?}", previous);

        self.store.delete(TOKEN_KEY).await?;
        self.store.delete(USER_ID_KEY).await?;
        Ok(())
    }

    /// Whether a token is held
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.token.is_some()
    }

    /// Bearer token of the current session
    pub async fn token(&self) -> Option<String> {
        self.state.read().await.token.clone()
    }

    /// Id of the signed-in user
    pub async fn user_id(&self) -> Option<UserId> {
        self.state.read().await.user_id
    }

    /// Password typed at the last login or registration, if any
    pub async fn current_password(&self) -> Option<String> {
        self.state
            .read()
            .await
            .password
            .as_ref()
            .map(|secret| secret.expose_secret().to_string())
    }

    /// Counter bumped by every login, restore and logout
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}
