//! Enrichment of posts, comments and users with read-time aggregates
//!
//! Like/comment/follow counts are computed from the store on each call. Scanning per
//! read is the known scaling limit of this service; any caching added later must
//! keep counts exact at read time.

use tracing::warn;

use crate::error::{Error, Result};
use crate::graph;
use crate::models::{Comment, EnrichedComment, EnrichedPost, Id, Post, PublicUser, UserWithStats};
use crate::store::Store;

/// Attach author, like count, comment count and, when a viewer is given, whether
/// the viewer liked the post.
///
/// Fails with `NotFound` if the author no longer exists.
pub async fn enrich_post(
    store: &dyn Store,
    post: Post,
    viewer: Option<Id>,
) -> Result<EnrichedPost> {
    match enrich_post_inner(store, post, viewer).await? {
        Ok(enriched) => Ok(enriched),
        Err(user_id) => Err(Error::not_found("user", user_id)),
    }
}

/// Enrich each post independently, preserving input order.
///
/// A post whose author has vanished is left out rather than failing the whole
/// list.
pub async fn enrich_posts(
    store: &dyn Store,
    posts: Vec<Post>,
    viewer: Option<Id>,
) -> Result<Vec<EnrichedPost>> {
    let mut enriched = Vec::with_capacity(posts.len());
    for post in posts {
        let post_id = post.id;
        match enrich_post_inner(store, post, viewer).await? {
            Ok(p) => enriched.push(p),
            Err(user_id) => warn!(post_id, user_id, "dropping post whose author is missing"),
        }
    }
    Ok(enriched)
}

/// The outer `Result` carries store failures; the inner `Err` carries the id of a
/// missing author.
async fn enrich_post_inner(
    store: &dyn Store,
    post: Post,
    viewer: Option<Id>,
) -> Result<std::result::Result<EnrichedPost, Id>> {
    let liked = async {
        match viewer {
            Some(viewer_id) => {
                Ok::<_, Error>(Some(store.get_like(post.id, viewer_id).await?.is_some()))
            }
            None => Ok(None),
        }
    };

    let (author, like_count, comment_count, is_liked) = tokio::try_join!(
        store.get_user(post.user_id),
        store.count_likes_by_post(post.id),
        store.count_comments_by_post(post.id),
        liked,
    )?;

    let Some(author) = author else {
        return Ok(Err(post.user_id));
    };

    Ok(Ok(EnrichedPost {
        post,
        user: PublicUser::from(author),
        like_count,
        comment_count,
        is_liked,
    }))
}

/// Attach the author to a comment. `None` when the author no longer exists.
pub async fn enrich_comment(
    store: &dyn Store,
    comment: Comment,
) -> Result<Option<EnrichedComment>> {
    Ok(store
        .get_user(comment.user_id)
        .await?
        .map(|author| EnrichedComment {
            comment,
            user: PublicUser::from(author),
        }))
}

/// Enrich comments in order, skipping those whose author is gone.
pub async fn enrich_comments(
    store: &dyn Store,
    comments: Vec<Comment>,
) -> Result<Vec<EnrichedComment>> {
    let mut out = Vec::with_capacity(comments.len());
    for comment in comments {
        if let Some(enriched) = enrich_comment(store, comment).await? {
            out.push(enriched);
        }
    }
    Ok(out)
}

/// Profile view of `user_id` with follow counts, plus `is_following` when a viewer
/// is given. `None` if the user does not exist.
pub async fn enrich_user_with_stats(
    store: &dyn Store,
    user_id: Id,
    viewer: Option<Id>,
) -> Result<Option<UserWithStats>> {
    let Some(user) = store.get_user(user_id).await? else {
        return Ok(None);
    };

    let is_following = async {
        match viewer {
            Some(viewer_id) => {
                Ok::<_, Error>(Some(graph::is_following(store, viewer_id, user_id).await?))
            }
            None => Ok(None),
        }
    };

    let (follower_count, following_count, is_following) = tokio::try_join!(
        graph::follower_count(store, user_id),
        graph::following_count(store, user_id),
        is_following,
    )?;

    Ok(Some(UserWithStats {
        user: PublicUser::from(user),
        follower_count,
        following_count,
        is_following,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewComment, NewPost, NewUser};
    use crate::store::MemoryStore;

    async fn user(store: &MemoryStore, name: &str) -> Id {
        store
            .create_user(NewUser {
                username: name.to_string(),
                password_hash: String::new(),
                display_name: name.to_string(),
                bio: None,
                avatar_url: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn post(store: &MemoryStore, user_id: Id) -> Post {
        store
            .create_post(NewPost {
                user_id,
                content: "post".to_string(),
                image_url: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_enrich_post_without_viewer_has_no_is_liked() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let p = post(&store, a).await;
        store.create_like(p.id, a).await.unwrap();

        let enriched = enrich_post(&store, p, None).await.unwrap();
        assert_eq!(enriched.is_liked, None);
        assert_eq!(enriched.like_count, 1);
        assert_eq!(enriched.user.username, "a");
    }

    #[tokio::test]
    async fn test_enrich_post_with_viewer() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;
        let p = post(&store, a).await;
        store.create_like(p.id, b).await.unwrap();
        store
            .create_comment(NewComment {
                post_id: p.id,
                user_id: b,
                content: "hey".to_string(),
            })
            .await
            .unwrap();

        let as_b = enrich_post(&store, p.clone(), Some(b)).await.unwrap();
        assert_eq!(as_b.is_liked, Some(true));
        assert_eq!(as_b.comment_count, 1);

        let as_a = enrich_post(&store, p, Some(a)).await.unwrap();
        assert_eq!(as_a.is_liked, Some(false));
    }

    #[tokio::test]
    async fn test_enrich_posts_preserves_order() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let first = post(&store, a).await;
        let second = post(&store, a).await;
        let third = post(&store, a).await;

        let input = vec![second.clone(), third.clone(), first.clone()];
        let ids: Vec<Id> = enrich_posts(&store, input, None)
            .await
            .unwrap()
            .iter()
            .map(|p| p.post.id)
            .collect();
        assert_eq!(ids, vec![second.id, third.id, first.id]);
    }

    #[tokio::test]
    async fn test_enrich_user_with_stats() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;
        graph::follow(&store, a, b).await.unwrap();

        let anon = enrich_user_with_stats(&store, b, None).await.unwrap().unwrap();
        assert_eq!(anon.follower_count, 1);
        assert_eq!(anon.following_count, 0);
        assert_eq!(anon.is_following, None);

        let as_a = enrich_user_with_stats(&store, b, Some(a)).await.unwrap().unwrap();
        assert_eq!(as_a.is_following, Some(true));

        let as_b = enrich_user_with_stats(&store, a, Some(b)).await.unwrap().unwrap();
        assert_eq!(as_b.is_following, Some(false));

        assert!(enrich_user_with_stats(&store, 404, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enrich_comments() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let p = post(&store, a).await;
        store
            .create_comment(NewComment {
                post_id: p.id,
                user_id: a,
                content: "first".to_string(),
            })
            .await
            .unwrap();
        let comments = store.list_comments_by_post(p.id).await.unwrap();
        let enriched = enrich_comments(&store, comments).await.unwrap();
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].user.username, "a");
        assert_eq!(enriched[0].comment.content, "first");
    }

    #[tokio::test]
    async fn test_post_with_missing_author() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;
        let kept = post(&store, a).await;
        let orphan = post(&store, b).await;
        store.remove_user_row(b).await;

        let err = enrich_post(&store, orphan.clone(), None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { entity_type: "user", .. }));

        let ids: Vec<Id> = enrich_posts(&store, vec![orphan, kept.clone()], Some(a))
            .await
            .unwrap()
            .iter()
            .map(|p| p.post.id)
            .collect();
        assert_eq!(ids, vec![kept.id]);
    }
}
