//! HttpGateway against a fake backend served by axum on a local port

use std::sync::{Arc, Mutex};

use axum::{Json, Router};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tokio_test::{assert_err, assert_ok};

use forum::gateway::{ForumApi, HttpGateway};
use forum::models::{Credentials, NewComment, ProfileUpdate};
use forum::session::{SessionStore, TOKEN_KEY, USER_ID_KEY};
use forum::ClientError;

/// One request as the backend saw it
#[derive(Debug, Clone)]
struct Seen {
    method: Method,
    target: String,
    authorization: Option<String>,
    body: Value,
}

#[derive(Default)]
struct Backend {
    seen: Mutex<Vec<Seen>>,
}

impl Backend {
    fn requests(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn last(&self) -> Seen {
        self.requests().pop().expect("no request reached the backend")
    }
}

fn thread_json(id: u64) -> Value {
    json!({
        "id": id,
        "title": "Three",
        "content": "body",
        "isPublic": true,
        "lock": false,
        "creatorId": 9,
        "createdAt": "2024-01-01T00:00:00Z",
        "likes": [7, 9],
        "watchees": [9]
    })
}

async fn handle(
    State(backend): State<Arc<Backend>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    backend.seen.lock().unwrap().push(Seen {
        method: method.clone(),
        target: uri.to_string(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    match (method.as_str(), uri.path()) {
        ("POST", "/auth/login") => {
            if body["email"] == "a@b.com" && body["password"] == "pw" {
                Json(json!({ "token": "t1", "userId": 7 })).into_response()
            } else {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Invalid email or password" })),
                )
                    .into_response()
            }
        }
        ("GET", "/threads") => Json(json!([5, 4, 3])).into_response(),
        ("GET", "/thread") if uri.query() == Some("id=3") => Json(thread_json(3)).into_response(),
        ("GET", "/thread") => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid thread ID" })),
        )
            .into_response(),
        ("GET", "/comments") => Json(json!([{
            "id": 11,
            "content": "hi",
            "creatorId": 7,
            "threadId": 3,
            "parentCommentId": null,
            "createdAt": "2024-01-01T00:05:00Z",
            "likes": []
        }]))
        .into_response(),
        ("POST", "/comment") => Json(json!({ "id": 42 })).into_response(),
        ("GET", "/user") => StatusCode::FORBIDDEN.into_response(),
        ("PUT", "/user") => StatusCode::OK.into_response(),
        (_, _) => Json(json!({})).into_response(),
    }
}

async fn spawn_backend() -> (Arc<Backend>, String) {
    let backend = Arc::new(Backend::default());
    let app = Router::new().fallback(handle).with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (backend, format!("http://{}", addr))
}

#[tokio::test]
async fn test_login_then_bearer_on_thread_list() {
    let (backend, url) = spawn_backend().await;
    let session = SessionStore::in_memory();
    let gateway = HttpGateway::new(url, session.clone());

    let auth = gateway
        .login(&Credentials {
            email: "a@b.com".to_string(),
            password: "pw".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(auth.token, "t1");
    assert_eq!(auth.user_id, 7);
    assert_eq!(backend.last().authorization, None);

    session.login(&auth.token, auth.user_id).await.unwrap();
    assert_eq!(session.token().await.as_deref(), Some("t1"));
    assert_eq!(session.user_id().await, Some(7));

    let ids = assert_ok!(gateway.list_thread_ids(0).await);
    assert_eq!(ids, vec![5, 4, 3]);

    let seen = backend.last();
    assert_eq!(seen.method, Method::GET);
    assert_eq!(seen.target, "/threads?start=0");
    assert_eq!(seen.authorization.as_deref(), Some("Bearer t1"));
}

#[tokio::test]
async fn test_session_keys_are_persisted() {
    use common::store::{KeyValueStore, MemoryStore};

    let (_backend, url) = spawn_backend().await;
    let kv = Arc::new(MemoryStore::new());
    let session = SessionStore::new(kv.clone());
    let gateway = HttpGateway::new(url, session.clone());

    let auth = gateway
        .login(&Credentials {
            email: "a@b.com".to_string(),
            password: "pw".to_string(),
        })
        .await
        .unwrap();
    session.login(&auth.token, auth.user_id).await.unwrap();

    assert_eq!(kv.get(TOKEN_KEY).await.unwrap().as_deref(), Some("t1"));
    assert_eq!(kv.get(USER_ID_KEY).await.unwrap().as_deref(), Some("7"));
}

#[tokio::test]
async fn test_error_body_becomes_http_error() {
    let (_backend, url) = spawn_backend().await;
    let gateway = HttpGateway::new(url, SessionStore::in_memory());

    let err = gateway
        .login(&Credentials {
            email: "a@b.com".to_string(),
            password: "nope".to_string(),
        })
        .await
        .unwrap_err();

    match err {
        ClientError::Http { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid email or password");
        }
        other => panic!("expected an HTTP error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_error_body_uses_status_reason() {
    let (_backend, url) = spawn_backend().await;
    let gateway = HttpGateway::new(url, SessionStore::in_memory());

    let err = assert_err!(gateway.get_user(7).await);
    assert_eq!(err.status(), Some(403));
    assert!(matches!(err, ClientError::Http { ref message, .. } if message == "Forbidden"));
}

#[tokio::test]
async fn test_thread_decodes_membership_sets() {
    let (backend, url) = spawn_backend().await;
    let session = SessionStore::in_memory();
    session.login("t1", 7).await.unwrap();
    let gateway = HttpGateway::new(url, session);

    let thread = gateway.get_thread(3).await.unwrap();
    assert_eq!(backend.last().target, "/thread?id=3");
    assert!(thread.liked_by(7));
    assert!(!thread.watched_by(7));

    let err = assert_err!(gateway.get_thread(4).await);
    assert_eq!(err.status(), Some(400));
}

#[tokio::test]
async fn test_mutation_wire_formats() {
    let (backend, url) = spawn_backend().await;
    let session = SessionStore::in_memory();
    session.login("t1", 7).await.unwrap();
    let gateway = HttpGateway::new(url, session);

    gateway.delete_thread(3).await.unwrap();
    let seen = backend.last();
    assert_eq!(seen.method, Method::DELETE);
    assert_eq!(seen.target, "/thread");
    assert_eq!(seen.body, json!({ "id": 3 }));

    gateway.set_thread_like(3, true).await.unwrap();
    let seen = backend.last();
    assert_eq!(seen.method, Method::PUT);
    assert_eq!(seen.target, "/thread/like");
    assert_eq!(seen.body, json!({ "id": 3, "turnon": true }));

    gateway.set_thread_watch(3, false).await.unwrap();
    assert_eq!(backend.last().body, json!({ "id": 3, "turnon": false }));
    assert_eq!(backend.last().target, "/thread/watch");

    gateway.set_comment_like(11, true).await.unwrap();
    assert_eq!(backend.last().target, "/comment/like");

    let id = gateway
        .create_comment(&NewComment {
            content: "hello".to_string(),
            thread_id: 3,
            parent_comment_id: None,
        })
        .await
        .unwrap();
    assert_eq!(id, 42);
    assert_eq!(
        backend.last().body,
        json!({ "content": "hello", "threadId": 3, "parentCommentId": null })
    );

    let all = backend.requests();
    assert!(all.iter().all(|s| s.authorization.as_deref() == Some("Bearer t1")));
}

#[tokio::test]
async fn test_comments_and_empty_success_body() {
    let (backend, url) = spawn_backend().await;
    let session = SessionStore::in_memory();
    session.login("t1", 7).await.unwrap();
    let gateway = HttpGateway::new(url, session);

    let comments = gateway.list_comments(3).await.unwrap();
    assert_eq!(backend.last().target, "/comments?threadId=3");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].parent_comment_id, None);

    gateway
        .update_user(&ProfileUpdate {
            name: Some("Ann".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(backend.last().body, json!({ "name": "Ann" }));
}
