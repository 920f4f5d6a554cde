//! Registration, login and logout

use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::extract::AuthUser;
use super::{optional_text, require_text, AppState};
use crate::auth;
use crate::enrich;
use crate::error::{Error, Result};
use crate::models::{NewUser, PublicUser, UserWithStats};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 30;
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 128;
pub(super) const DISPLAY_NAME_MAX: usize = 50;
pub(super) const BIO_MAX: usize = 160;
pub(super) const URL_MAX: usize = 2048;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: PublicUser,
    pub token: String,
}

fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(Error::validation(format!(
            "username must be {}-{} characters",
            USERNAME_MIN, USERNAME_MAX
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(Error::validation(
            "username may only contain letters, digits and underscores",
        ));
    }
    Ok(username.to_string())
}

fn validate_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(Error::validation(format!(
            "password must be {}-{} characters",
            PASSWORD_MIN, PASSWORD_MAX
        )));
    }
    Ok(())
}

/// Create an account and open a session for it
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let username = validate_username(&req.username)?;
    validate_password(&req.password)?;
    let display_name =
        optional_text("displayName", req.display_name.as_deref(), DISPLAY_NAME_MAX)?
            .unwrap_or_else(|| username.clone());
    let bio = optional_text("bio", req.bio.as_deref(), BIO_MAX)?;
    let avatar_url = optional_text("avatarUrl", req.avatar_url.as_deref(), URL_MAX)?;

    if state.store.get_user_by_username(&username).await?.is_some() {
        return Err(Error::conflict("username already taken"));
    }

    let password_hash = auth::hash_password(req.password).await?;
    let user = state
        .store
        .create_user(NewUser {
            username,
            password_hash,
            display_name,
            bio,
            avatar_url,
        })
        .await?;
    let token = state.sessions.create(user.id).await;
    info!(user_id = user.id, username = %user.username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user: user.into(),
            token,
        }),
    ))
}

/// Exchange credentials for a session token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let invalid = || Error::unauthorized("invalid username or password");

    let user = state
        .store
        .get_user_by_username(req.username.trim())
        .await?
        .ok_or_else(invalid)?;
    if !auth::verify_password(req.password, user.password_hash.clone()).await? {
        return Err(invalid());
    }

    let token = state.sessions.create(user.id).await;
    info!(user_id = user.id, "user logged in");
    Ok(Json(SessionResponse {
        user: user.into(),
        token,
    }))
}

pub async fn logout(State(state): State<Arc<AppState>>, auth: AuthUser) -> StatusCode {
    state.sessions.revoke(&auth.token).await;
    StatusCode::NO_CONTENT
}

/// The caller's own profile with follow counts
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<UserWithStats>> {
    enrich::enrich_user_with_stats(state.store.as_ref(), auth.id, None)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("user", auth.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert_eq!(validate_username(" alice_1 ").unwrap(), "alice_1");
        assert!(validate_username("al").is_err());
        assert!(validate_username("alice smith").is_err());
        assert!(validate_username(&"a".repeat(31)).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("12345").is_err());
    }
}
