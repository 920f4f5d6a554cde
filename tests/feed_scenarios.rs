//! End-to-end scenarios over the in-memory store

use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use socialgraph::{enrich, graph};
use socialgraph::{FeedEngine, Id, MemoryStore, NewComment, NewPost, NewUser, Store};

fn store() -> Arc<dyn Store> {
    Arc::new(MemoryStore::new())
}

async fn user(store: &dyn Store, username: &str) -> Id {
    store
        .create_user(NewUser {
            username: username.to_string(),
            password_hash: "x".to_string(),
            display_name: username.to_string(),
            bio: None,
            avatar_url: None,
        })
        .await
        .unwrap()
        .id
}

async fn post(store: &dyn Store, user_id: Id, content: &str) -> Id {
    store
        .create_post(NewPost {
            user_id,
            content: content.to_string(),
            image_url: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn follow_like_unfollow_flow() {
    let store = store();
    let feeds = FeedEngine::new(store.clone());
    let alice = user(store.as_ref(), "alice").await;
    let bob = user(store.as_ref(), "bob").await;

    assert_ok!(graph::follow(store.as_ref(), alice, bob).await);
    let x = post(store.as_ref(), bob, "X").await;

    let feed = feeds.feed_for_user(alice).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].post.id, x);
    assert_eq!(feed[0].is_liked, Some(false));
    assert_eq!(feed[0].like_count, 0);

    store.create_like(x, alice).await.unwrap();
    let feed = feeds.feed_for_user(alice).await.unwrap();
    assert_eq!(feed[0].is_liked, Some(true));
    assert_eq!(feed[0].like_count, 1);

    assert!(graph::unfollow(store.as_ref(), alice, bob).await.unwrap());
    let feed = feeds.feed_for_user(alice).await.unwrap();
    assert!(feed.iter().all(|p| p.post.id != x));
}

#[tokio::test]
async fn feed_includes_own_posts_newest_first() {
    let store = store();
    let feeds = FeedEngine::new(store.clone());
    let alice = user(store.as_ref(), "alice").await;
    let bob = user(store.as_ref(), "bob").await;
    let carol = user(store.as_ref(), "carol").await;
    graph::follow(store.as_ref(), alice, bob).await.unwrap();

    let first = post(store.as_ref(), alice, "mine").await;
    let second = post(store.as_ref(), bob, "followed").await;
    post(store.as_ref(), carol, "stranger").await;

    let ids: Vec<Id> = feeds
        .feed_for_user(alice)
        .await
        .unwrap()
        .iter()
        .map(|p| p.post.id)
        .collect();
    assert_eq!(ids, vec![second, first]);

    let discover = feeds.discover_feed().await.unwrap();
    assert_eq!(discover.len(), 3);
    assert!(discover.iter().all(|p| p.is_liked.is_none()));
}

#[tokio::test]
async fn search_is_case_insensitive_substring() {
    let store = store();
    user(store.as_ref(), "alice").await;
    user(store.as_ref(), "bob").await;
    user(store.as_ref(), "Alison").await;

    let mut names: Vec<String> = store
        .search_users("ali")
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.username)
        .collect();
    names.sort();
    assert_eq!(names, vec!["Alison".to_string(), "alice".to_string()]);

    assert!(store.search_users("").await.unwrap().is_empty());
    assert!(store.search_users("   ").await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_post_removes_its_likes_and_comments() {
    let store = store();
    let alice = user(store.as_ref(), "alice").await;
    let bob = user(store.as_ref(), "bob").await;
    let x = post(store.as_ref(), alice, "X").await;

    store.create_like(x, bob).await.unwrap();
    let comment = store
        .create_comment(NewComment {
            post_id: x,
            user_id: bob,
            content: "nice".to_string(),
        })
        .await
        .unwrap();

    assert!(store.delete_post(x).await.unwrap());
    assert!(store.get_post(x).await.unwrap().is_none());
    assert!(store.get_comment(comment.id).await.unwrap().is_none());
    assert_eq!(store.count_likes_by_post(x).await.unwrap(), 0);
    assert_eq!(store.count_comments_by_post(x).await.unwrap(), 0);
    assert!(store.get_like(x, bob).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_like_and_follow_conflict() {
    let store = store();
    let alice = user(store.as_ref(), "alice").await;
    let bob = user(store.as_ref(), "bob").await;
    let x = post(store.as_ref(), bob, "X").await;

    store.create_like(x, alice).await.unwrap();
    let err = assert_err!(store.create_like(x, alice).await);
    assert!(err.is_conflict());
    assert_eq!(store.count_likes_by_post(x).await.unwrap(), 1);

    graph::follow(store.as_ref(), alice, bob).await.unwrap();
    let err = assert_err!(graph::follow(store.as_ref(), alice, bob).await);
    assert!(err.is_conflict());

    let err = assert_err!(graph::follow(store.as_ref(), alice, alice).await);
    assert!(err.is_conflict());
    assert_eq!(graph::following_count(store.as_ref(), alice).await.unwrap(), 1);
}

#[tokio::test]
async fn profile_stats_depend_on_viewer() {
    let store = store();
    let alice = user(store.as_ref(), "alice").await;
    let bob = user(store.as_ref(), "bob").await;
    graph::follow(store.as_ref(), alice, bob).await.unwrap();

    let anonymous = enrich::enrich_user_with_stats(store.as_ref(), bob, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(anonymous.follower_count, 1);
    assert_eq!(anonymous.following_count, 0);
    assert_eq!(anonymous.is_following, None);

    let seen_by_alice = enrich::enrich_user_with_stats(store.as_ref(), bob, Some(alice))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen_by_alice.is_following, Some(true));

    let seen_by_bob = enrich::enrich_user_with_stats(store.as_ref(), alice, Some(bob))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen_by_bob.is_following, Some(false));
}

#[tokio::test]
async fn deleting_a_user_clears_their_footprint() {
    let store = store();
    let feeds = FeedEngine::new(store.clone());
    let alice = user(store.as_ref(), "alice").await;
    let bob = user(store.as_ref(), "bob").await;
    let alices_post = post(store.as_ref(), alice, "hello").await;
    let bobs_post = post(store.as_ref(), bob, "hi").await;
    store.create_like(bobs_post, alice).await.unwrap();
    graph::follow(store.as_ref(), bob, alice).await.unwrap();

    assert!(store.delete_user(alice).await.unwrap());
    assert!(store.get_post(alices_post).await.unwrap().is_none());
    assert_eq!(store.count_likes_by_post(bobs_post).await.unwrap(), 0);
    assert_eq!(graph::following_count(store.as_ref(), bob).await.unwrap(), 0);
    assert!(feeds.user_posts(alice, None).await.unwrap().is_none());
}
