use socialgraph::config::{Config, StoreBackend};
use socialgraph::{store, FeedEngine, NewPost, NewUser};

#[tokio::test]
#[ignore]
async fn postgres_store_roundtrip() {
    // Ignored by default. Run with `cargo test -- --ignored` against a scratch
    // database: DATABASE_URL=postgres://... cargo test --test postgres_store -- --ignored
    let Ok(url) = std::env::var("DATABASE_URL") else {
        return;
    };

    let mut config = Config::for_memory();
    config.store.backend = StoreBackend::Postgres;
    config.store.run_migrations = true;
    config.database.url = url;

    let (store, db) = store::connect(&config).await.unwrap();
    let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];

    let mut ids = Vec::new();
    for name in ["pg_alice", "pg_bob"] {
        let user = store
            .create_user(NewUser {
                username: format!("{}_{}", name, suffix),
                password_hash: "x".to_string(),
                display_name: name.to_string(),
                bio: None,
                avatar_url: None,
            })
            .await
            .unwrap();
        ids.push(user.id);
    }
    let (alice, bob) = (ids[0], ids[1]);

    store.create_follow(alice, bob).await.unwrap();
    assert!(store.create_follow(alice, bob).await.unwrap_err().is_conflict());

    let post = store
        .create_post(NewPost {
            user_id: bob,
            content: "from postgres".to_string(),
            image_url: None,
        })
        .await
        .unwrap();
    store.create_like(post.id, alice).await.unwrap();
    assert!(store.create_like(post.id, alice).await.unwrap_err().is_conflict());

    let feed = FeedEngine::new(store.clone()).feed_for_user(alice).await.unwrap();
    let item = feed.iter().find(|p| p.post.id == post.id).unwrap();
    assert_eq!(item.is_liked, Some(true));
    assert_eq!(item.like_count, 1);

    let found = store.search_users(&format!("ALICE_{}", suffix)).await.unwrap();
    assert_eq!(found.len(), 1);

    assert!(store.delete_post(post.id).await.unwrap());
    assert_eq!(store.count_likes_by_post(post.id).await.unwrap(), 0);

    store.delete_user(alice).await.unwrap();
    store.delete_user(bob).await.unwrap();
    if let Some(db) = db {
        db.close().await;
    }
}
