//! Relationship index over the follow graph
//!
//! Follower/following sets are resolved from Follow rows on every call. Counts are
//! the cardinalities of those sets; nothing is cached or denormalized, so a count is
//! always consistent with the rows at read time.

use std::collections::HashSet;

use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::models::{Follow, Id, PublicUser};
use crate::store::Store;

/// Whether `follower_id` follows `followee_id`
pub async fn is_following(store: &dyn Store, follower_id: Id, followee_id: Id) -> Result<bool> {
    Ok(store.get_follow(follower_id, followee_id).await?.is_some())
}

/// Users following `user_id`. Rows whose user has since been deleted are skipped.
pub async fn followers(store: &dyn Store, user_id: Id) -> Result<Vec<PublicUser>> {
    let rows = store.list_followers(user_id).await?;
    resolve_users(store, rows.iter().map(|f| f.follower_id)).await
}

/// Users `user_id` follows. Rows whose user has since been deleted are skipped.
pub async fn following(store: &dyn Store, user_id: Id) -> Result<Vec<PublicUser>> {
    let rows = store.list_following(user_id).await?;
    resolve_users(store, rows.iter().map(|f| f.following_id)).await
}

/// Ids of the users `user_id` follows that still exist
pub async fn following_ids(store: &dyn Store, user_id: Id) -> Result<Vec<Id>> {
    Ok(following(store, user_id)
        .await?
        .into_iter()
        .map(|u| u.id)
        .collect())
}

pub async fn follower_count(store: &dyn Store, user_id: Id) -> Result<u64> {
    Ok(followers(store, user_id).await?.len() as u64)
}

pub async fn following_count(store: &dyn Store, user_id: Id) -> Result<u64> {
    Ok(following(store, user_id).await?.len() as u64)
}

/// Create a follow edge.
///
/// Self-follow is rejected before the store is touched. An existing edge for the
/// pair is reported as `Conflict`, and a missing followee as `NotFound`.
#[instrument(skip(store))]
pub async fn follow(store: &dyn Store, follower_id: Id, followee_id: Id) -> Result<Follow> {
    if follower_id == followee_id {
        return Err(Error::conflict("users cannot follow themselves"));
    }
    if store.get_user(followee_id).await?.is_none() {
        return Err(Error::not_found("user", followee_id));
    }
    if is_following(store, follower_id, followee_id).await? {
        return Err(Error::conflict("already following this user"));
    }

    let edge = store.create_follow(follower_id, followee_id).await?;
    info!(follower_id, followee_id, "user followed");
    Ok(edge)
}

/// Remove the follow edge for the pair. Returns false when there was none.
#[instrument(skip(store))]
pub async fn unfollow(store: &dyn Store, follower_id: Id, followee_id: Id) -> Result<bool> {
    let Some(edge) = store.get_follow(follower_id, followee_id).await? else {
        debug!(follower_id, followee_id, "unfollow without existing edge");
        return Ok(false);
    };
    let removed = store.delete_follow(edge.id).await?;
    if removed {
        info!(follower_id, followee_id, "user unfollowed");
    }
    Ok(removed)
}

/// Resolve ids to users in row order, dropping duplicates and vanished users.
async fn resolve_users(
    store: &dyn Store,
    ids: impl Iterator<Item = Id>,
) -> Result<Vec<PublicUser>> {
    let mut seen = HashSet::new();
    let mut users = Vec::new();
    for id in ids {
        if !seen.insert(id) {
            continue;
        }
        match store.get_user(id).await? {
            Some(user) => users.push(PublicUser::from(user)),
            None => debug!(user_id = id, "skipping follow row for missing user"),
        }
    }
    Ok(users)
}
