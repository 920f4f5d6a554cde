//! HTTP flows against the router backed by the in-memory store

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use socialgraph::api::{self, AppState};
use socialgraph::auth::SessionStore;
use socialgraph::{Config, MemoryStore};

fn app() -> Router {
    let state = Arc::new(AppState::new(
        Arc::new(MemoryStore::new()),
        SessionStore::new(Duration::from_secs(3600)),
    ));
    api::router(state, &Config::for_memory().api)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Register `username` and return (user id, token)
async fn register(app: &Router, username: &str) -> (u64, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": username, "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (
        body["user"]["id"].as_u64().unwrap(),
        body["token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn health_reports_healthy() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn register_login_and_duplicate_username() {
    let app = app();
    register(&app, "alice").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": "ALICE", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_EXISTS");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["user"].get("passwordHash").is_none());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn feed_requires_a_session() {
    let app = app();
    let (status, _) = send(&app, Method::GET, "/api/feed", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, token) = register(&app, "alice").await;
    let (status, _) = send(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, "/api/feed", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn follow_post_like_and_feed() {
    let app = app();
    let (_, alice_token) = register(&app, "alice").await;
    let (bob, bob_token) = register(&app, "bob").await;

    let follow_uri = format!("/api/users/{}/follow", bob);
    let (status, _) = send(&app, Method::POST, &follow_uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, Method::POST, &follow_uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/posts",
        Some(&bob_token),
        Some(json!({ "content": "hello from bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let post_id = created["id"].as_u64().unwrap();

    let (status, feed) = send(&app, Method::GET, "/api/feed", Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed[0]["id"].as_u64(), Some(post_id));
    assert_eq!(feed[0]["isLiked"], false);
    assert_eq!(feed[0]["user"]["username"], "bob");

    let like_uri = format!("/api/posts/{}/like", post_id);
    let (status, _) = send(&app, Method::POST, &like_uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, Method::POST, &like_uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, feed) = send(&app, Method::GET, "/api/feed", Some(&alice_token), None).await;
    assert_eq!(feed[0]["isLiked"], true);
    assert_eq!(feed[0]["likeCount"], 1);

    // anonymous readers get no isLiked field at all
    let (_, post) = send(&app, Method::GET, &format!("/api/posts/{}", post_id), None, None).await;
    assert!(post.get("isLiked").is_none());
    assert_eq!(post["likeCount"], 1);

    let (status, _) = send(&app, Method::DELETE, &follow_uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, feed) = send(&app, Method::GET, "/api/feed", Some(&alice_token), None).await;
    assert_eq!(feed, json!([]));
}

#[tokio::test]
async fn only_the_author_can_delete_a_post() {
    let app = app();
    let (_, alice_token) = register(&app, "alice").await;
    let (_, bob_token) = register(&app, "bob").await;

    let (_, created) = send(
        &app,
        Method::POST,
        "/api/posts",
        Some(&alice_token),
        Some(json!({ "content": "mine" })),
    )
    .await;
    let post_uri = format!("/api/posts/{}", created["id"]);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("{}/comments", post_uri),
        Some(&bob_token),
        Some(json!({ "content": "nice" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["username"], "bob");

    let (status, _) = send(&app, Method::DELETE, &post_uri, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::DELETE, &post_uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &post_uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, &format!("{}/comments", post_uri), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_and_validation() {
    let app = app();
    let (_, token) = register(&app, "alice").await;
    register(&app, "alison").await;
    register(&app, "bob").await;

    let (status, users) = send(&app, Method::GET, "/api/users/search?q=ALI", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);

    let (_, users) = send(&app, Method::GET, "/api/users/search", None, None).await;
    assert_eq!(users, json!([]));

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/posts",
        Some(&token),
        Some(json!({ "content": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_string_clears_optional_fields() {
    let app = app();
    let (_, token) = register(&app, "alice").await;

    let (status, profile) = send(
        &app,
        Method::PATCH,
        "/api/users/me",
        Some(&token),
        Some(json!({ "bio": "hello", "avatarUrl": "https://img/a.png" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["bio"], "hello");

    // omitted fields stay, empty string clears
    let (_, profile) = send(
        &app,
        Method::PATCH,
        "/api/users/me",
        Some(&token),
        Some(json!({ "bio": "" })),
    )
    .await;
    assert!(profile.get("bio").is_none());
    assert_eq!(profile["avatarUrl"], "https://img/a.png");

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/api/users/me",
        Some(&token),
        Some(json!({ "displayName": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, created) = send(
        &app,
        Method::POST,
        "/api/posts",
        Some(&token),
        Some(json!({ "content": "pic", "imageUrl": "https://img/p.png" })),
    )
    .await;
    assert_eq!(created["imageUrl"], "https://img/p.png");

    let (status, updated) = send(
        &app,
        Method::PATCH,
        &format!("/api/posts/{}", created["id"]),
        Some(&token),
        Some(json!({ "imageUrl": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(updated.get("imageUrl").is_none());
    assert_eq!(updated["content"], "pic");
}
