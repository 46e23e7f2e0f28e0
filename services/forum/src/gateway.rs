//! Typed access to the forum backend
//!
//! [`ForumApi`] has one method per backend operation. [`HttpGateway`] is the
//! real implementation: JSON over HTTP with the session's bearer token attached
//! to every request that has one. Nothing is cached and nothing is retried.

use async_trait::async_trait;
use common::config::ClientConfig;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};
use crate::models::{
    AuthToken, Comment, CommentId, CommentUpdate, Created, Credentials, NewComment, NewThread,
    ProfileUpdate, Registration, Thread, ThreadId, ThreadUpdate, Toggle, User, UserId,
};
use crate::session::SessionStore;

/// Backend operations used by the client
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ForumApi: Send + Sync {
    /// `POST /auth/login`
    async fn login(&self, credentials: &Credentials) -> ClientResult<AuthToken>;

    /// `POST /auth/register`
    async fn register(&self, registration: &Registration) -> ClientResult<AuthToken>;

    /// `GET /user?userId=`
    async fn get_user(&self, user_id: UserId) -> ClientResult<User>;

    /// `PUT /user`
    async fn update_user(&self, update: &ProfileUpdate) -> ClientResult<()>;

    /// `GET /threads?start=`, at most one page of ids
    async fn list_thread_ids(&self, start: usize) -> ClientResult<Vec<ThreadId>>;

    /// `GET /thread?id=`
    async fn get_thread(&self, id: ThreadId) -> ClientResult<Thread>;

    /// `POST /thread`, returning the new id
    async fn create_thread(&self, thread: &NewThread) -> ClientResult<ThreadId>;

    /// `PUT /thread`
    async fn update_thread(&self, update: &ThreadUpdate) -> ClientResult<()>;

    /// `DELETE /thread`
    async fn delete_thread(&self, id: ThreadId) -> ClientResult<()>;

    /// `PUT /thread/like`
    async fn set_thread_like(&self, id: ThreadId, on: bool) -> ClientResult<()>;

    /// `PUT /thread/watch`
    async fn set_thread_watch(&self, id: ThreadId, on: bool) -> ClientResult<()>;

    /// `GET /comments?threadId=`
    async fn list_comments(&self, thread_id: ThreadId) -> ClientResult<Vec<Comment>>;

    /// `POST /comment`, returning the new id
    async fn create_comment(&self, comment: &NewComment) -> ClientResult<CommentId>;

    /// `PUT /comment`
    async fn update_comment(&self, update: &CommentUpdate) -> ClientResult<()>;

    /// `PUT /comment/like`
    async fn set_comment_like(&self, id: CommentId, on: bool) -> ClientResult<()>;
}

/// Error body sent by the backend on rejection
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP implementation of [`ForumApi`]
#[derive(Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
}

impl HttpGateway {
    /// Create a gateway for `base_url` without a request timeout
    pub fn new(base_url: impl Into<String>, session: SessionStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    /// Create a gateway from the client configuration
    pub fn from_config(config: &ClientConfig, session: SessionStore) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the bearer token when the session has one
    async fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.session.token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let resp = self.authed(builder).await.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let code = status.as_u16();
        let body = resp.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => parsed.error,
            Err(_) if body.trim().is_empty() => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
            Err(_) => body,
        };
        warn!("Request failed with HTTP {}: {}", code, message);
        Err(ClientError::Http {
            status: code,
            message,
        })
    }

    /// Send and decode a JSON body
    async fn fetch<R: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<R> {
        let resp = self.send(builder).await?;
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(format!("response body: {}", e)))
    }

    /// Send and ignore whatever the backend answers on success
    async fn execute(&self, builder: RequestBuilder) -> ClientResult<()> {
        self.send(builder).await?;
        Ok(())
    }
}

#[async_trait]
impl ForumApi for HttpGateway {
    async fn login(&self, credentials: &Credentials) -> ClientResult<AuthToken> {
        debug!("POST /auth/login for {}", credentials.email);
        self.fetch(self.http.post(self.url("/auth/login")).json(credentials))
            .await
    }

    async fn register(&self, registration: &Registration) -> ClientResult<AuthToken> {
        debug!("POST /auth/register for {}", registration.email);
        self.fetch(self.http.post(self.url("/auth/register")).json(registration))
            .await
    }

    async fn get_user(&self, user_id: UserId) -> ClientResult<User> {
        debug!("GET /user userId={}", user_id);
        self.fetch(self.http.get(self.url("/user")).query(&[("userId", user_id)]))
            .await
    }

    async fn update_user(&self, update: &ProfileUpdate) -> ClientResult<()> {
        debug!("PUT /user");
        self.execute(self.http.put(self.url("/user")).json(update))
            .await
    }

    async fn list_thread_ids(&self, start: usize) -> ClientResult<Vec<ThreadId>> {
        debug!("GET /threads start={}", start);
        self.fetch(self.http.get(self.url("/threads")).query(&[("start", start)]))
            .await
    }

    async fn get_thread(&self, id: ThreadId) -> ClientResult<Thread> {
        debug!("GET /thread id={}", id);
        self.fetch(self.http.get(self.url("/thread")).query(&[("id", id)]))
            .await
    }

    async fn create_thread(&self, thread: &NewThread) -> ClientResult<ThreadId> {
        debug!("POST /thread {:?}", thread.title);
        let created: Created = self
            .fetch(self.http.post(self.url("/thread")).json(thread))
            .await?;
        Ok(created.id)
    }

    async fn update_thread(&self, update: &ThreadUpdate) -> ClientResult<()> {
        debug!("PUT /thread id={}", update.id);
        self.execute(self.http.put(self.url("/thread")).json(update))
            .await
    }

    async fn delete_thread(&self, id: ThreadId) -> ClientResult<()> {
        debug!("DELETE /thread id={}", id);
        self.execute(
            self.http
                .delete(self.url("/thread"))
                .json(&serde_json::json!({ "id": id })),
        )
        .await
    }

    async fn set_thread_like(&self, id: ThreadId, on: bool) -> ClientResult<()> {
        debug!("PUT /thread/like id={} turnon={}", id, on);
        self.execute(
            self.http
                .put(self.url("/thread/like"))
                .json(&Toggle { id, turnon: on }),
        )
        .await
    }

    async fn set_thread_watch(&self, id: ThreadId, on: bool) -> ClientResult<()> {
        debug!("PUT /thread/watch id={} turnon={}", id, on);
        self.execute(
            self.http
                .put(self.url("/thread/watch"))
                .json(&Toggle { id, turnon: on }),
        )
        .await
    }

    async fn list_comments(&self, thread_id: ThreadId) -> ClientResult<Vec<Comment>> {
        debug!("GET /comments threadId={}", thread_id);
        self.fetch(
            self.http
                .get(self.url("/comments"))
                .query(&[("threadId", thread_id)]),
        )
        .await
    }

    async fn create_comment(&self, comment: &NewComment) -> ClientResult<CommentId> {
        debug!(
            "POST /comment threadId={} parent={:?}",
            comment.thread_id, comment.parent_comment_id
        );
        let created: Created = self
            .fetch(self.http.post(self.url("/comment")).json(comment))
            .await?;
        Ok(created.id)
    }

    async fn update_comment(&self, update: &CommentUpdate) -> ClientResult<()> {
        debug!("PUT /comment id={}", update.id);
        self.execute(self.http.put(self.url("/comment")).json(update))
            .await
    }

    async fn set_comment_like(&self, id: CommentId, on: bool) -> ClientResult<()> {
        debug!("PUT /comment/like id={} turnon={}", id, on);
        self.execute(
            self.http
                .put(self.url("/comment/like"))
                .json(&Toggle { id, turnon: on }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let gateway = HttpGateway::new("http://localhost:5005/", SessionStore::in_memory());
        assert_eq!(gateway.url("/threads"), "http://localhost:5005/threads");
    }

    #[test]
    fn test_from_config_uses_api_url() {
        let config = ClientConfig {
            api_url: "http://forum.test:8080".to_string(),
            session_file: None,
            request_timeout_secs: Some(5),
        };
        let gateway = HttpGateway::from_config(&config, SessionStore::in_memory()).unwrap();
        assert_eq!(gateway.url("/user"), "http://forum.test:8080/user");
    }
}
