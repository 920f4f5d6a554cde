//! PostgreSQL store
//!
//! Row structs mirror the tables in `migrations/` and convert into the model types.
//! Pair uniqueness (likes, follows) and username uniqueness are enforced by unique
//! indexes; their violations surface as `Error::Conflict` via `From<sqlx::Error>`.
//! Cascading deletes run inside a single transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use super::{search_needle, Store};
use crate::error::Result;
use crate::models::{
    Comment, Follow, Id, Like, NewComment, NewPost, NewUser, Post, PostUpdate, User, UserUpdate,
};

const USER_COLUMNS: &str = "id, username, password_hash, display_name, bio, avatar_url, created_at";
const POST_COLUMNS: &str = "id, user_id, content, image_url, created_at";
const COMMENT_COLUMNS: &str = "id, post_id, user_id, content, created_at";
const LIKE_COLUMNS: &str = "id, post_id, user_id, created_at";
const FOLLOW_COLUMNS: &str = "id, follower_id, following_id, created_at";

/// Ids beyond the BIGINT range cannot exist in the database; map them to a value
/// no BIGSERIAL ever produces so lookups come back empty.
fn db_id(id: Id) -> i64 {
    i64::try_from(id).unwrap_or(-1)
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    display_name: String,
    bio: Option<String>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id as Id,
            username: r.username,
            password_hash: r.password_hash,
            display_name: r.display_name,
            bio: r.bio,
            avatar_url: r.avatar_url,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PostRow {
    id: i64,
    user_id: i64,
    content: String,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PostRow> for Post {
    fn from(r: PostRow) -> Self {
        Self {
            id: r.id as Id,
            user_id: r.user_id as Id,
            content: r.content,
            image_url: r.image_url,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    user_id: i64,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(r: CommentRow) -> Self {
        Self {
            id: r.id as Id,
            post_id: r.post_id as Id,
            user_id: r.user_id as Id,
            content: r.content,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct LikeRow {
    id: i64,
    post_id: i64,
    user_id: i64,
    created_at: DateTime<Utc>,
}

impl From<LikeRow> for Like {
    fn from(r: LikeRow) -> Self {
        Self {
            id: r.id as Id,
            post_id: r.post_id as Id,
            user_id: r.user_id as Id,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct FollowRow {
    id: i64,
    follower_id: i64,
    following_id: i64,
    created_at: DateTime<Utc>,
}

impl From<FollowRow> for Follow {
    fn from(r: FollowRow) -> Self {
        Self {
            id: r.id as Id,
            follower_id: r.follower_id as Id,
            following_id: r.following_id as Id,
            created_at: r.created_at,
        }
    }
}

/// Escape LIKE metacharacters so user input matches literally.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Store backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn cascade_post(tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<bool> {
        let comments = sqlx::query("DELETE FROM comments WHERE post_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        let likes = sqlx::query("DELETE FROM likes WHERE post_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        let deleted = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?
            .rows_affected()
            > 0;
        debug!(post_id = id, comments, likes, deleted, "cascaded post deletion");
        Ok(deleted)
    }
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (username, password_hash, display_name, bio, avatar_url) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(&user.bio)
        .bind(&user.avatar_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(db_id(id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(username) = lower($1)"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn update_user(&self, id: Id, update: UserUpdate) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET \
                display_name = COALESCE($2, display_name), \
                bio = CASE WHEN $3 THEN $4 ELSE bio END, \
                avatar_url = CASE WHEN $5 THEN $6 ELSE avatar_url END \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(db_id(id))
        .bind(update.display_name)
        .bind(update.bio.is_some())
        .bind(update.bio.flatten())
        .bind(update.avatar_url.is_some())
        .bind(update.avatar_url.flatten())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: Id) -> Result<bool> {
        let id = db_id(id);
        let mut tx = self.pool.begin().await?;

        let owned: Vec<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE user_id = $1")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
        for post_id in owned {
            Self::cascade_post(&mut tx, post_id).await?;
        }
        sqlx::query("DELETE FROM comments WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM likes WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM follows WHERE follower_id = $1 OR following_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        tx.commit().await?;
        Ok(deleted)
    }

    async fn search_users(&self, query: &str) -> Result<Vec<User>> {
        let Some(needle) = search_needle(query) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE lower(username) LIKE $1 ESCAPE '\\' OR lower(display_name) LIKE $1 ESCAPE '\\' \
             ORDER BY id"
        ))
        .bind(like_pattern(&needle))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "INSERT INTO posts (user_id, content, image_url) VALUES ($1, $2, $3) \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(db_id(post.user_id))
        .bind(&post.content)
        .bind(&post.image_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_post(&self, id: Id) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(db_id(id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn update_post(&self, id: Id, update: PostUpdate) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "UPDATE posts SET \
                content = COALESCE($2, content), \
                image_url = CASE WHEN $3 THEN $4 ELSE image_url END \
             WHERE id = $1 RETURNING {POST_COLUMNS}"
        ))
        .bind(db_id(id))
        .bind(update.content)
        .bind(update.image_url.is_some())
        .bind(update.image_url.flatten())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn delete_post(&self, id: Id) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let deleted = Self::cascade_post(&mut tx, db_id(id)).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn list_posts(&self) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_posts_by_users(&self, user_ids: &[Id]) -> Result<Vec<Post>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = user_ids.iter().copied().map(db_id).collect();
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE user_id = ANY($1) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "INSERT INTO comments (post_id, user_id, content) VALUES ($1, $2, $3) \
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(db_id(comment.post_id))
        .bind(db_id(comment.user_id))
        .bind(&comment.content)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_comment(&self, id: Id) -> Result<Option<Comment>> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(db_id(id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_comments_by_post(&self, post_id: Id) -> Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1 \
             ORDER BY created_at, id"
        ))
        .bind(db_id(post_id))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_comments_by_post(&self, post_id: Id) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(db_id(post_id))
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn delete_comment(&self, id: Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(db_id(id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_like(&self, post_id: Id, user_id: Id) -> Result<Like> {
        let row = sqlx::query_as::<_, LikeRow>(&format!(
            "INSERT INTO likes (post_id, user_id) VALUES ($1, $2) RETURNING {LIKE_COLUMNS}"
        ))
        .bind(db_id(post_id))
        .bind(db_id(user_id))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_like(&self, post_id: Id, user_id: Id) -> Result<Option<Like>> {
        let row = sqlx::query_as::<_, LikeRow>(&format!(
            "SELECT {LIKE_COLUMNS} FROM likes WHERE post_id = $1 AND user_id = $2"
        ))
        .bind(db_id(post_id))
        .bind(db_id(user_id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_likes_by_post(&self, post_id: Id) -> Result<Vec<Like>> {
        let rows = sqlx::query_as::<_, LikeRow>(&format!(
            "SELECT {LIKE_COLUMNS} FROM likes WHERE post_id = $1 ORDER BY id"
        ))
        .bind(db_id(post_id))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_likes_by_post(&self, post_id: Id) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(db_id(post_id))
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn delete_like(&self, id: Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE id = $1")
            .bind(db_id(id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_follow(&self, follower_id: Id, following_id: Id) -> Result<Follow> {
        let row = sqlx::query_as::<_, FollowRow>(&format!(
            "INSERT INTO follows (follower_id, following_id) VALUES ($1, $2) \
             RETURNING {FOLLOW_COLUMNS}"
        ))
        .bind(db_id(follower_id))
        .bind(db_id(following_id))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_follow(&self, follower_id: Id, following_id: Id) -> Result<Option<Follow>> {
        let row = sqlx::query_as::<_, FollowRow>(&format!(
            "SELECT {FOLLOW_COLUMNS} FROM follows WHERE follower_id = $1 AND following_id = $2"
        ))
        .bind(db_id(follower_id))
        .bind(db_id(following_id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_followers(&self, user_id: Id) -> Result<Vec<Follow>> {
        let rows = sqlx::query_as::<_, FollowRow>(&format!(
            "SELECT {FOLLOW_COLUMNS} FROM follows WHERE following_id = $1 ORDER BY id"
        ))
        .bind(db_id(user_id))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_following(&self, user_id: Id) -> Result<Vec<Follow>> {
        let rows = sqlx::query_as::<_, FollowRow>(&format!(
            "SELECT {FOLLOW_COLUMNS} FROM follows WHERE follower_id = $1 ORDER BY id"
        ))
        .bind(db_id(user_id))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_follow(&self, id: Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE id = $1")
            .bind(db_id(id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
