//! Entity store
//!
//! The `Store` trait is the boundary between the graph core and persistence.
//! Two implementations exist and one is picked at startup:
//!
//! - [`memory::MemoryStore`] - tables in process memory behind one lock
//! - [`postgres::PgStore`] - PostgreSQL through a sqlx pool
//!
//! Unknown ids are `None` / `false`, never errors. Duplicate like and follow pairs
//! come back as [`Error::Conflict`](crate::error::Error::Conflict). Anything else is
//! a store failure and propagates unchanged.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, StoreBackend};
use crate::database::{self, Database};
use crate::error::Result;
use crate::models::{
    Comment, Follow, Id, Like, NewComment, NewPost, NewUser, Post, PostUpdate, User, UserUpdate,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    // ------------------------------------------------------------------ users

    /// Insert a user. Fails with `Conflict` when the username is taken,
    /// compared case-insensitively.
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn get_user(&self, id: Id) -> Result<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn update_user(&self, id: Id, update: UserUpdate) -> Result<Option<User>>;
    /// Remove a user together with everything that references it.
    async fn delete_user(&self, id: Id) -> Result<bool>;
    /// Case-insensitive substring match on username or display name.
    /// A blank query matches nothing.
    async fn search_users(&self, query: &str) -> Result<Vec<User>>;

    // ------------------------------------------------------------------ posts

    async fn create_post(&self, post: NewPost) -> Result<Post>;
    async fn get_post(&self, id: Id) -> Result<Option<Post>>;
    async fn update_post(&self, id: Id, update: PostUpdate) -> Result<Option<Post>>;
    /// Delete a post and its comments and likes as one unit.
    async fn delete_post(&self, id: Id) -> Result<bool>;
    /// All posts, newest first.
    async fn list_posts(&self) -> Result<Vec<Post>>;
    /// Posts authored by any of `user_ids`, newest first.
    async fn list_posts_by_users(&self, user_ids: &[Id]) -> Result<Vec<Post>>;

    // --------------------------------------------------------------- comments

    async fn create_comment(&self, comment: NewComment) -> Result<Comment>;
    async fn get_comment(&self, id: Id) -> Result<Option<Comment>>;
    /// Comments on a post, oldest first.
    async fn list_comments_by_post(&self, post_id: Id) -> Result<Vec<Comment>>;
    async fn count_comments_by_post(&self, post_id: Id) -> Result<u64>;
    async fn delete_comment(&self, id: Id) -> Result<bool>;

    // ------------------------------------------------------------------ likes

    async fn create_like(&self, post_id: Id, user_id: Id) -> Result<Like>;
    async fn get_like(&self, post_id: Id, user_id: Id) -> Result<Option<Like>>;
    async fn list_likes_by_post(&self, post_id: Id) -> Result<Vec<Like>>;
    async fn count_likes_by_post(&self, post_id: Id) -> Result<u64>;
    async fn delete_like(&self, id: Id) -> Result<bool>;

    // ---------------------------------------------------------------- follows

    async fn create_follow(&self, follower_id: Id, following_id: Id) -> Result<Follow>;
    async fn get_follow(&self, follower_id: Id, following_id: Id) -> Result<Option<Follow>>;
    /// Follow rows pointing at `user_id`.
    async fn list_followers(&self, user_id: Id) -> Result<Vec<Follow>>;
    /// Follow rows originating from `user_id`.
    async fn list_following(&self, user_id: Id) -> Result<Vec<Follow>>;
    async fn delete_follow(&self, id: Id) -> Result<bool>;

    async fn health_check(&self) -> Result<()>;
}

/// Build the store selected by configuration.
///
/// Returns the database handle alongside the store when postgres is used so the
/// caller can close the pool on shutdown.
pub async fn connect(config: &Config) -> Result<(Arc<dyn Store>, Option<Database>)> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store");
            Ok((Arc::new(MemoryStore::new()), None))
        }
        StoreBackend::Postgres => {
            let db = Database::new(&config.database).await?;
            if config.store.run_migrations {
                database::run_migrations(db.pool()).await?;
            }
            info!("Using postgres store");
            Ok((Arc::new(PgStore::new(db.pool().clone())), Some(db)))
        }
    }
}

/// Ordering shared by every post listing: newest first, later id first on ties.
pub(crate) fn newest_first(a: &Post, b: &Post) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Lowercased, trimmed search needle, or `None` when the query is blank.
pub(crate) fn search_needle(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}
