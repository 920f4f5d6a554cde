//! In-memory store
//!
//! Every relation is a `BTreeMap` keyed by id with its own monotonic counter.
//! All tables sit behind a single `RwLock`, so each mutation, cascades included,
//! runs under one write guard and no reader sees a half-applied cascade.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{newest_first, search_needle, Store};
use crate::error::{Error, Result};
use crate::models::{
    Comment, Follow, Id, Like, NewComment, NewPost, NewUser, Post, PostUpdate, User, UserUpdate,
};

/// Rows of one relation plus its id counter. Ids start at 1 and are never reused.
#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<Id, T>,
    next_id: Id,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> Table<T> {
    fn allocate(&mut self) -> Id {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn remove_where(&mut self, pred: impl Fn(&T) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|_, row| !pred(row));
        before - self.rows.len()
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: Table<User>,
    posts: Table<Post>,
    comments: Table<Comment>,
    likes: Table<Like>,
    follows: Table<Follow>,
}

impl Tables {
    fn require_user(&self, id: Id) -> Result<()> {
        if self.users.rows.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::ConstraintViolation {
                message: format!("user {} does not exist", id).into(),
            })
        }
    }

    fn require_post(&self, id: Id) -> Result<()> {
        if self.posts.rows.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::ConstraintViolation {
                message: format!("post {} does not exist", id).into(),
            })
        }
    }

    fn find_like(&self, post_id: Id, user_id: Id) -> Option<&Like> {
        self.likes
            .rows
            .values()
            .find(|l| l.post_id == post_id && l.user_id == user_id)
    }

    fn find_follow(&self, follower_id: Id, following_id: Id) -> Option<&Follow> {
        self.follows
            .rows
            .values()
            .find(|f| f.follower_id == follower_id && f.following_id == following_id)
    }

    /// Cascade for post deletion: comments and likes first, then the post.
    fn remove_post(&mut self, id: Id) -> bool {
        if self.posts.rows.remove(&id).is_none() {
            return false;
        }
        let comments = self.comments.remove_where(|c| c.post_id == id);
        let likes = self.likes.remove_where(|l| l.post_id == id);
        debug!(post_id = id, comments, likes, "cascaded post deletion");
        true
    }
}

/// Store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a user row without cascading, leaving rows that reference it dangling
    #[cfg(test)]
    pub(crate) async fn remove_user_row(&self, id: Id) {
        self.tables.write().await.users.rows.remove(&id);
    }
}

/// Username comparison matching Postgres `lower(a) = lower(b)`
fn same_username(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut t = self.tables.write().await;
        let taken = t
            .users
            .rows
            .values()
            .any(|u| same_username(&u.username, &user.username));
        if taken {
            return Err(Error::conflict("username already taken"));
        }

        let id = t.users.allocate();
        let row = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            display_name: user.display_name,
            bio: user.bio,
            avatar_url: user.avatar_url,
            created_at: Utc::now(),
        };
        t.users.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.rows.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t
            .users
            .rows
            .values()
            .find(|u| same_username(&u.username, username))
            .cloned())
    }

    async fn update_user(&self, id: Id, update: UserUpdate) -> Result<Option<User>> {
        let mut t = self.tables.write().await;
        let Some(user) = t.users.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(display_name) = update.display_name {
            user.display_name = display_name;
        }
        if let Some(bio) = update.bio {
            user.bio = bio;
        }
        if let Some(avatar_url) = update.avatar_url {
            user.avatar_url = avatar_url;
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Id) -> Result<bool> {
        let mut t = self.tables.write().await;
        if t.users.rows.remove(&id).is_none() {
            return Ok(false);
        }
        let owned: Vec<Id> = t
            .posts
            .rows
            .values()
            .filter(|p| p.user_id == id)
            .map(|p| p.id)
            .collect();
        for post_id in owned {
            t.remove_post(post_id);
        }
        t.comments.remove_where(|c| c.user_id == id);
        t.likes.remove_where(|l| l.user_id == id);
        t.follows
            .remove_where(|f| f.follower_id == id || f.following_id == id);
        Ok(true)
    }

    async fn search_users(&self, query: &str) -> Result<Vec<User>> {
        let Some(needle) = search_needle(query) else {
            return Ok(Vec::new());
        };
        let t = self.tables.read().await;
        Ok(t
            .users
            .rows
            .values()
            .filter(|u| {
                u.username.to_lowercase().contains(&needle)
                    || u.display_name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        let mut t = self.tables.write().await;
        t.require_user(post.user_id)?;
        let id = t.posts.allocate();
        let row = Post {
            id,
            user_id: post.user_id,
            content: post.content,
            image_url: post.image_url,
            created_at: Utc::now(),
        };
        t.posts.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn get_post(&self, id: Id) -> Result<Option<Post>> {
        Ok(self.tables.read().await.posts.rows.get(&id).cloned())
    }

    async fn update_post(&self, id: Id, update: PostUpdate) -> Result<Option<Post>> {
        let mut t = self.tables.write().await;
        let Some(post) = t.posts.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(content) = update.content {
            post.content = content;
        }
        if let Some(image_url) = update.image_url {
            post.image_url = image_url;
        }
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: Id) -> Result<bool> {
        Ok(self.tables.write().await.remove_post(id))
    }

    async fn list_posts(&self) -> Result<Vec<Post>> {
        let t = self.tables.read().await;
        let mut posts: Vec<Post> = t.posts.rows.values().cloned().collect();
        posts.sort_by(newest_first);
        Ok(posts)
    }

    async fn list_posts_by_users(&self, user_ids: &[Id]) -> Result<Vec<Post>> {
        let t = self.tables.read().await;
        let mut posts: Vec<Post> = t
            .posts
            .rows
            .values()
            .filter(|p| user_ids.contains(&p.user_id))
            .cloned()
            .collect();
        posts.sort_by(newest_first);
        Ok(posts)
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let mut t = self.tables.write().await;
        t.require_post(comment.post_id)?;
        t.require_user(comment.user_id)?;
        let id = t.comments.allocate();
        let row = Comment {
            id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            content: comment.content,
            created_at: Utc::now(),
        };
        t.comments.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn get_comment(&self, id: Id) -> Result<Option<Comment>> {
        Ok(self.tables.read().await.comments.rows.get(&id).cloned())
    }

    async fn list_comments_by_post(&self, post_id: Id) -> Result<Vec<Comment>> {
        let t = self.tables.read().await;
        let mut comments: Vec<Comment> = t
            .comments
            .rows
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn count_comments_by_post(&self, post_id: Id) -> Result<u64> {
        let t = self.tables.read().await;
        Ok(t.comments.rows.values().filter(|c| c.post_id == post_id).count() as u64)
    }

    async fn delete_comment(&self, id: Id) -> Result<bool> {
        Ok(self.tables.write().await.comments.rows.remove(&id).is_some())
    }

    async fn create_like(&self, post_id: Id, user_id: Id) -> Result<Like> {
        let mut t = self.tables.write().await;
        t.require_post(post_id)?;
        t.require_user(user_id)?;
        if t.find_like(post_id, user_id).is_some() {
            return Err(Error::conflict("post already liked by this user"));
        }
        let id = t.likes.allocate();
        let row = Like {
            id,
            post_id,
            user_id,
            created_at: Utc::now(),
        };
        t.likes.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn get_like(&self, post_id: Id, user_id: Id) -> Result<Option<Like>> {
        Ok(self.tables.read().await.find_like(post_id, user_id).cloned())
    }

    async fn list_likes_by_post(&self, post_id: Id) -> Result<Vec<Like>> {
        let t = self.tables.read().await;
        Ok(t
            .likes
            .rows
            .values()
            .filter(|l| l.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn count_likes_by_post(&self, post_id: Id) -> Result<u64> {
        let t = self.tables.read().await;
        Ok(t.likes.rows.values().filter(|l| l.post_id == post_id).count() as u64)
    }

    async fn delete_like(&self, id: Id) -> Result<bool> {
        Ok(self.tables.write().await.likes.rows.remove(&id).is_some())
    }

    async fn create_follow(&self, follower_id: Id, following_id: Id) -> Result<Follow> {
        let mut t = self.tables.write().await;
        t.require_user(follower_id)?;
        t.require_user(following_id)?;
        if t.find_follow(follower_id, following_id).is_some() {
            return Err(Error::conflict("already following this user"));
        }
        let id = t.follows.allocate();
        let row = Follow {
            id,
            follower_id,
            following_id,
            created_at: Utc::now(),
        };
        t.follows.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn get_follow(&self, follower_id: Id, following_id: Id) -> Result<Option<Follow>> {
        Ok(self
            .tables
            .read()
            .await
            .find_follow(follower_id, following_id)
            .cloned())
    }

    async fn list_followers(&self, user_id: Id) -> Result<Vec<Follow>> {
        let t = self.tables.read().await;
        Ok(t
            .follows
            .rows
            .values()
            .filter(|f| f.following_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_following(&self, user_id: Id) -> Result<Vec<Follow>> {
        let t = self.tables.read().await;
        Ok(t
            .follows
            .rows
            .values()
            .filter(|f| f.follower_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_follow(&self, id: Id) -> Result<bool> {
        Ok(self.tables.write().await.follows.rows.remove(&id).is_some())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
