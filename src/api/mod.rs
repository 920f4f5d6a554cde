//! HTTP API Server
//!
//! JSON endpoints over the social graph core. Authentication is a bearer token
//! issued by `/api/auth/register` or `/api/auth/login`.

pub mod extract;
mod posts;
mod session;
mod users;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::SessionStore;
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::feed::FeedEngine;
use crate::store::Store;

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub feeds: FeedEngine,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, sessions: SessionStore) -> Self {
        Self {
            feeds: FeedEngine::new(store.clone()),
            store,
            sessions,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Build the application router with its middleware stack
pub fn router(state: Arc<AppState>, config: &ApiConfig) -> Router {
    let api = Router::new()
        // Sessions
        .route("/auth/register", post(session::register))
        .route("/auth/login", post(session::login))
        .route("/auth/logout", post(session::logout))
        .route("/auth/me", get(session::me))
        // Users
        .route("/users/search", get(users::search))
        .route("/users/me", get(session::me).patch(users::update_me))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/posts", get(users::user_posts))
        .route("/users/:id/followers", get(users::followers))
        .route("/users/:id/following", get(users::following))
        .route(
            "/users/:id/follow",
            post(users::follow).delete(users::unfollow),
        )
        // Feeds
        .route("/feed", get(posts::feed))
        .route("/feed/discover", get(posts::discover))
        // Posts
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/:id",
            get(posts::get_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/posts/:id/like", post(posts::like).delete(posts::unlike))
        .route("/posts/:id/likes", get(posts::likes))
        .route(
            "/posts/:id/comments",
            get(posts::comments).post(posts::create_comment),
        )
        .route("/comments/:id", delete(posts::delete_comment));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    if config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app.with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn start_server(
    state: Arc<AppState>,
    config: &ApiConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = router(state, config);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::config(format!("Failed to bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(Error::internal)?;

    Ok(())
}

/// Health check endpoint
async fn health_check(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<HealthResponse>, StatusCode> {
    match state.store.health_check().await {
        Ok(()) => Ok(Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })),
        Err(e) => {
            tracing::error!("Health check failed: {:?}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

// ============================================================================
// Input validation
// ============================================================================

/// Trimmed, non-empty text of at most `max` characters
pub(crate) fn require_text(field: &'static str, value: &str, max: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{} must not be empty", field)));
    }
    if trimmed.chars().count() > max {
        return Err(Error::validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(trimmed.to_string())
}

/// Like [`require_text`], but `None` passes through and blank becomes `None`
pub(crate) fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => require_text(field, v, max).map(Some),
    }
}

/// Value for a clearable field: absent leaves it unchanged (`None`), a blank string
/// clears it (`Some(None)`), anything else is validated like [`require_text`]
pub(crate) fn clearable_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<Option<String>>> {
    match value.map(str::trim) {
        None => Ok(None),
        Some("") => Ok(Some(None)),
        Some(v) => require_text(field, v, max).map(|v| Some(Some(v))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("content", "  hi  ", 10).unwrap(), "hi");
        assert!(require_text("content", "   ", 10).is_err());
        assert!(require_text("content", "abcdef", 5).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text("bio", None, 5).unwrap(), None);
        assert_eq!(optional_text("bio", Some(" "), 5).unwrap(), None);
        assert_eq!(optional_text("bio", Some("ok"), 5).unwrap(), Some("ok".to_string()));
        assert!(optional_text("bio", Some("too long"), 5).is_err());
    }

    #[test]
    fn test_clearable_text() {
        assert_eq!(clearable_text("bio", None, 5).unwrap(), None);
        assert_eq!(clearable_text("bio", Some("  "), 5).unwrap(), Some(None));
        assert_eq!(
            clearable_text("bio", Some(" hi "), 5).unwrap(),
            Some(Some("hi".to_string()))
        );
        assert!(clearable_text("bio", Some("too long"), 5).is_err());
    }
}
