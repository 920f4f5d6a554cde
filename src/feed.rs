//! Feed composition
//!
//! Both feeds are reverse-chronological (newest first, later id first on equal
//! timestamps) and fully enriched.
//!
//! ## Feed Types
//!
//! - **Personalized**: posts by the viewer and everyone the viewer follows,
//!   enriched with the viewer so `is_liked` is populated
//! - **Discovery**: every post, enriched without a viewer

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::enrich;
use crate::error::Result;
use crate::graph;
use crate::models::{EnrichedPost, Id};
use crate::store::Store;

/// Builds feeds on top of a shared store
#[derive(Clone)]
pub struct FeedEngine {
    store: Arc<dyn Store>,
}

impl FeedEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// All posts, newest first, with no viewer context.
    #[instrument(skip(self))]
    pub async fn discover_feed(&self) -> Result<Vec<EnrichedPost>> {
        let posts = self.store.list_posts().await?;
        let feed = enrich::enrich_posts(self.store.as_ref(), posts, None).await?;
        debug!(count = feed.len(), "composed discovery feed");
        Ok(feed)
    }

    /// Posts by `viewer_id` and by the users `viewer_id` follows, newest first.
    ///
    /// A viewer who follows nobody gets their own posts only; an empty feed is a
    /// valid result.
    #[instrument(skip(self))]
    pub async fn feed_for_user(&self, viewer_id: Id) -> Result<Vec<EnrichedPost>> {
        let store = self.store.as_ref();

        let mut authors = graph::following_ids(store, viewer_id).await?;
        authors.push(viewer_id);

        let posts = store.list_posts_by_users(&authors).await?;
        let feed = enrich::enrich_posts(store, posts, Some(viewer_id)).await?;
        debug!(
            count = feed.len(),
            followees = authors.len() - 1,
            "composed personalized feed"
        );
        Ok(feed)
    }

    /// Posts authored by `user_id`, newest first. `None` if the user does not exist.
    #[instrument(skip(self))]
    pub async fn user_posts(
        &self,
        user_id: Id,
        viewer: Option<Id>,
    ) -> Result<Option<Vec<EnrichedPost>>> {
        let store = self.store.as_ref();
        if store.get_user(user_id).await?.is_none() {
            return Ok(None);
        }
        let posts = store.list_posts_by_users(&[user_id]).await?;
        Ok(Some(enrich::enrich_posts(store, posts, viewer).await?))
    }
}
