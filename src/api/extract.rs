//! Viewer extractors
//!
//! `AuthUser` requires a valid bearer token; `Viewer` resolves one if present and
//! otherwise yields an anonymous viewer.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;

use super::AppState;
use crate::error::Error;
use crate::models::Id;

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Id,
    pub token: String,
}

/// Optional caller identity; `None` for anonymous requests
#[derive(Debug, Clone, Copy)]
pub struct Viewer(pub Option<Id>);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| Error::unauthorized("missing bearer token"))?
            .to_string();
        let id = state
            .sessions
            .resolve(&token)
            .await
            .ok_or_else(|| Error::unauthorized("invalid or expired session"))?;
        Ok(Self { id, token })
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Viewer {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let id = match bearer_token(parts) {
            Some(token) => state.sessions.resolve(token).await,
            None => None,
        };
        Ok(Self(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("bearer  abc "))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }
}
