//! Follow edges between users and channels.
//!
//! An edge is two records: `channels/{c}/followers/{u}` and
//! `channels/{u}/following/{c}`. Follow writes them in that order, unfollow
//! deletes them in that order, so a half edge tells which operation was
//! interrupted.

use std::collections::BTreeSet;
use std::sync::Arc;

use devhub_db::DocumentStore;
use devhub_types::document::encode;
use devhub_types::models::FollowRecord;
use devhub_types::path::paths;
use devhub_types::query::{Query, WriteBatch};
use devhub_types::{HubError, HubResult};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct RelationshipController {
    store: Arc<dyn DocumentStore>,
}

impl RelationshipController {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn is_following(&self, follower: &str, channel: &str) -> HubResult<bool> {
        Ok(self.store.get(&paths::follower(channel, follower)?).await?.is_some())
    }

    pub async fn follower_count(&self, channel: &str) -> HubResult<usize> {
        self.store.count(&paths::followers(channel)?).await
    }

    pub async fn following_count(&self, user: &str) -> HubResult<usize> {
        self.store.count(&paths::following(user)?).await
    }

    pub async fn follow(&self, follower: &str, channel: &str) -> HubResult<()> {
        if follower == channel {
            return Err(HubError::denied("cannot follow your own channel"));
        }
        let record = encode(&FollowRecord::now())?;
        let batch = WriteBatch::new()
            .put(paths::follower(channel, follower)?, record.clone())
            .put(paths::followed(follower, channel)?, record);

        debug!(
            "{} follows {} (atomic: {})",
            follower,
            channel,
            self.store.supports_transactions()
        );
        self.store.commit(batch).await
    }

    pub async fn unfollow(&self, follower: &str, channel: &str) -> HubResult<()> {
        if follower == channel {
            return Err(HubError::denied("cannot unfollow your own channel"));
        }
        let batch = WriteBatch::new()
            .delete(paths::follower(channel, follower)?)
            .delete(paths::followed(follower, channel)?);

        debug!(
            "{} unfollows {} (atomic: {})",
            follower,
            channel,
            self.store.supports_transactions()
        );
        self.store.commit(batch).await
    }

    pub async fn set_following(&self, follower: &str, channel: &str, follow: bool) -> HubResult<()> {
        if follow {
            self.follow(follower, channel).await
        } else {
            self.unfollow(follower, channel).await
        }
    }

    /// Check one (follower, channel) pair and roll back a half-applied
    /// operation. An orphaned follower record (interrupted follow) is
    /// removed; an orphaned following record (interrupted unfollow) gets its
    /// follower record back. Returns whether a repair was made.
    pub async fn repair_edge(&self, follower: &str, channel: &str) -> HubResult<bool> {
        let follower_path = paths::follower(channel, follower)?;
        let following_path = paths::followed(follower, channel)?;

        let (in_followers, in_following) =
            tokio::join!(self.store.get(&follower_path), self.store.get(&following_path));

        match (in_followers?, in_following?) {
            (Some(_), None) => {
                warn!("Rolling back half-written follow {} -> {}", follower, channel);
                self.store.delete(&follower_path).await?;
                Ok(true)
            }
            (None, Some(kept)) => {
                warn!("Rolling back half-applied unfollow {} -> {}", follower, channel);
                self.store.put(&follower_path, kept.data).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Sweep `follower`'s following set plus the candidate channels and
    /// repair one-sided edges. With no candidates every channel is checked.
    /// Returns the number of repairs.
    pub async fn reconcile_edges(&self, follower: &str, candidates: &[String]) -> HubResult<usize> {
        let following = self
            .store
            .find(&Query::new(paths::following(follower)?))
            .await?;
        let extra: Vec<String> = if candidates.is_empty() {
            self.store
                .find(&Query::new(paths::channels()))
                .await?
                .iter()
                .map(|doc| doc.id().to_string())
                .collect()
        } else {
            candidates.to_vec()
        };

        let channels: BTreeSet<String> = following
            .iter()
            .map(|doc| doc.id().to_string())
            .chain(extra)
            .filter(|c| c != follower)
            .collect();

        let mut repaired = 0;
        for channel in &channels {
            if self.repair_edge(follower, channel).await? {
                repaired += 1;
            }
        }

        if repaired > 0 {
            info!("Repaired {} follow edges for {}", repaired, follower);
        }
        Ok(repaired)
    }
}
