//! Posts, likes, comments and feeds

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::extract::{AuthUser, Viewer};
use super::session::URL_MAX;
use super::{clearable_text, optional_text, require_text, AppState};
use crate::enrich;
use crate::error::{Error, Result};
use crate::models::{
    EnrichedComment, EnrichedPost, Id, Like, NewComment, NewPost, Post, PostUpdate,
};

const POST_MAX: usize = 2000;
const COMMENT_MAX: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub content: String,
    pub image_url: Option<String>,
}

/// Post patch. Omitted fields are left alone; an empty `imageUrl` removes the
/// image.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub content: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

async fn require_post(state: &AppState, id: Id) -> Result<Post> {
    state
        .store
        .get_post(id)
        .await?
        .ok_or_else(|| Error::not_found("post", id))
}

// ----------------------------------------------------------------------- feeds

/// Personalized feed: the caller's posts and posts from users they follow
pub async fn feed(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<EnrichedPost>>> {
    Ok(Json(state.feeds.feed_for_user(auth.id).await?))
}

/// Discovery feed: every post, newest first
pub async fn discover(State(state): State<Arc<AppState>>) -> Result<Json<Vec<EnrichedPost>>> {
    Ok(Json(state.feeds.discover_feed().await?))
}

// ----------------------------------------------------------------------- posts

pub async fn create_post(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<EnrichedPost>)> {
    let content = require_text("content", &req.content, POST_MAX)?;
    let image_url = optional_text("imageUrl", req.image_url.as_deref(), URL_MAX)?;

    let post = state
        .store
        .create_post(NewPost {
            user_id: auth.id,
            content,
            image_url,
        })
        .await?;
    info!(post_id = post.id, user_id = auth.id, "post created");

    let enriched = enrich::enrich_post(state.store.as_ref(), post, Some(auth.id)).await?;
    Ok((StatusCode::CREATED, Json(enriched)))
}

pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    Viewer(viewer): Viewer,
) -> Result<Json<EnrichedPost>> {
    let post = require_post(&state, id).await?;
    Ok(Json(
        enrich::enrich_post(state.store.as_ref(), post, viewer).await?,
    ))
}

pub async fn update_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    auth: AuthUser,
    Json(req): Json<UpdatePostRequest>,
) -> Result<Json<EnrichedPost>> {
    let post = require_post(&state, id).await?;
    if post.user_id != auth.id {
        return Err(Error::forbidden("only the author can edit this post"));
    }

    let update = PostUpdate {
        content: req
            .content
            .as_deref()
            .map(|c| require_text("content", c, POST_MAX))
            .transpose()?,
        image_url: clearable_text("imageUrl", req.image_url.as_deref(), URL_MAX)?,
    };
    let post = state
        .store
        .update_post(id, update)
        .await?
        .ok_or_else(|| Error::not_found("post", id))?;

    Ok(Json(
        enrich::enrich_post(state.store.as_ref(), post, Some(auth.id)).await?,
    ))
}

/// Delete a post with its comments and likes
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    auth: AuthUser,
) -> Result<StatusCode> {
    let post = require_post(&state, id).await?;
    if post.user_id != auth.id {
        return Err(Error::forbidden("only the author can delete this post"));
    }
    if !state.store.delete_post(id).await? {
        return Err(Error::not_found("post", id));
    }
    info!(post_id = id, user_id = auth.id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------- likes

pub async fn like(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    auth: AuthUser,
) -> Result<(StatusCode, Json<Like>)> {
    require_post(&state, id).await?;
    if state.store.get_like(id, auth.id).await?.is_some() {
        return Err(Error::conflict("post already liked by this user"));
    }
    let like = state.store.create_like(id, auth.id).await?;
    Ok((StatusCode::CREATED, Json(like)))
}

pub async fn unlike(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    auth: AuthUser,
) -> Result<StatusCode> {
    let like = state
        .store
        .get_like(id, auth.id)
        .await?
        .ok_or_else(|| Error::not_found("like", format!("post {} by user {}", id, auth.id)))?;
    state.store.delete_like(like.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn likes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> Result<Json<Vec<Like>>> {
    require_post(&state, id).await?;
    Ok(Json(state.store.list_likes_by_post(id).await?))
}

// -------------------------------------------------------------------- comments

pub async fn comments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> Result<Json<Vec<EnrichedComment>>> {
    require_post(&state, id).await?;
    let comments = state.store.list_comments_by_post(id).await?;
    Ok(Json(
        enrich::enrich_comments(state.store.as_ref(), comments).await?,
    ))
}

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    auth: AuthUser,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<EnrichedComment>)> {
    let content = require_text("content", &req.content, COMMENT_MAX)?;
    require_post(&state, id).await?;

    let comment = state
        .store
        .create_comment(NewComment {
            post_id: id,
            user_id: auth.id,
            content,
        })
        .await?;
    let comment_id = comment.id;
    let enriched = enrich::enrich_comment(state.store.as_ref(), comment)
        .await?
        .ok_or_else(|| Error::not_found("user", auth.id))?;
    info!(comment_id, post_id = id, user_id = auth.id, "comment created");
    Ok((StatusCode::CREATED, Json(enriched)))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    auth: AuthUser,
) -> Result<StatusCode> {
    let comment = state
        .store
        .get_comment(id)
        .await?
        .ok_or_else(|| Error::not_found("comment", id))?;
    if comment.user_id != auth.id {
        return Err(Error::forbidden("only the author can delete this comment"));
    }
    state.store.delete_comment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
