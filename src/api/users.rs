//! Profiles, search and the follow graph

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::extract::{AuthUser, Viewer};
use super::session::{BIO_MAX, DISPLAY_NAME_MAX, URL_MAX};
use super::{clearable_text, require_text, AppState};
use crate::enrich;
use crate::error::{Error, Result};
use crate::graph;
use crate::models::{EnrichedPost, Follow, Id, PublicUser, UserUpdate, UserWithStats};

/// Profile patch. Omitted or `null` fields are left alone; an empty `bio` or
/// `avatarUrl` clears it. `displayName` cannot be blank.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Case-insensitive search over usernames and display names
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<PublicUser>>> {
    let users = state.store.search_users(&query.q).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    Viewer(viewer): Viewer,
) -> Result<Json<UserWithStats>> {
    enrich::enrich_user_with_stats(state.store.as_ref(), id, viewer)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("user", id))
}

/// Update the caller's display name, bio or avatar
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>> {
    let update = UserUpdate {
        display_name: req
            .display_name
            .as_deref()
            .map(|name| require_text("displayName", name, DISPLAY_NAME_MAX))
            .transpose()?,
        bio: clearable_text("bio", req.bio.as_deref(), BIO_MAX)?,
        avatar_url: clearable_text("avatarUrl", req.avatar_url.as_deref(), URL_MAX)?,
    };

    let user = if update.is_empty() {
        state.store.get_user(auth.id).await?
    } else {
        state.store.update_user(auth.id, update).await?
    };
    user.map(|u| Json(PublicUser::from(u)))
        .ok_or_else(|| Error::not_found("user", auth.id))
}

pub async fn user_posts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    Viewer(viewer): Viewer,
) -> Result<Json<Vec<EnrichedPost>>> {
    state
        .feeds
        .user_posts(id, viewer)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("user", id))
}

async fn require_user(state: &AppState, id: Id) -> Result<()> {
    match state.store.get_user(id).await? {
        Some(_) => Ok(()),
        None => Err(Error::not_found("user", id)),
    }
}

pub async fn followers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> Result<Json<Vec<PublicUser>>> {
    require_user(&state, id).await?;
    Ok(Json(graph::followers(state.store.as_ref(), id).await?))
}

pub async fn following(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> Result<Json<Vec<PublicUser>>> {
    require_user(&state, id).await?;
    Ok(Json(graph::following(state.store.as_ref(), id).await?))
}

pub async fn follow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    auth: AuthUser,
) -> Result<(StatusCode, Json<Follow>)> {
    let edge = graph::follow(state.store.as_ref(), auth.id, id).await?;
    Ok((StatusCode::CREATED, Json(edge)))
}

pub async fn unfollow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    auth: AuthUser,
) -> Result<StatusCode> {
    if graph::unfollow(state.store.as_ref(), auth.id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::not_found("follow", format!("{}->{}", auth.id, id)))
    }
}
