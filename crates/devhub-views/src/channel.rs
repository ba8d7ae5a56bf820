//! Channel pages: handle lookup, the channel's public projects, and the
//! viewer's follow state.

use std::sync::Arc;

use devhub_db::DocumentStore;
use devhub_types::document::encode;
use devhub_types::events::Notice;
use devhub_types::models::{Channel, Project, Session};
use devhub_types::path::paths;
use devhub_types::query::Query;
use devhub_types::{ErrorKind, HubError, HubResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ViewError;
use crate::follow::RelationshipController;
use crate::projects::public_projects;
use crate::reconcile::{FollowState, ToggleOutcome};

pub const CHANNEL_NOT_FOUND: &str = "Channel not found";
pub const CHANNEL_LOAD_FAILED: &str = "Failed to load channel data";

/// Handles compare without case and without a leading `@`.
pub fn normalize_handle(handle: &str) -> String {
    let trimmed = handle.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed).to_lowercase()
}

fn valid_handle(handle: &str) -> bool {
    !handle.is_empty()
        && handle.len() <= 32
        && handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

pub async fn resolve_handle(store: &dyn DocumentStore, handle: &str) -> HubResult<Option<Channel>> {
    let handle = normalize_handle(handle);
    if handle.is_empty() {
        return Ok(None);
    }
    let docs = store
        .find(&Query::new(paths::channels()).eq("handle", handle).limit(1))
        .await?;
    docs.first().map(|doc| doc.decode::<Channel>()).transpose()
}

#[derive(Clone)]
pub struct ChannelDirectory {
    store: Arc<dyn DocumentStore>,
}

impl ChannelDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, handle: &str) -> HubResult<Option<Channel>> {
        resolve_handle(self.store.as_ref(), handle).await
    }

    /// Create or update the session user's channel. The stored handle is
    /// normalized and must not belong to another channel.
    pub async fn create_channel(
        &self,
        session: &Session,
        name: &str,
        handle: &str,
        description: &str,
        logo_url: &str,
    ) -> HubResult<Channel> {
        let handle = normalize_handle(handle);
        if !valid_handle(&handle) {
            return Err(HubError::malformed(format!("invalid handle '@{}'", handle)));
        }
        if name.trim().is_empty() {
            return Err(HubError::malformed("channel name is required"));
        }

        if let Some(existing) = self.resolve(&handle).await? {
            if existing.id != session.user_id {
                return Err(HubError::denied(format!("handle @{} is taken", handle)));
            }
        }

        let channel = Channel {
            id: session.user_id.clone(),
            name: name.trim().to_string(),
            handle,
            description: description.to_string(),
            logo_url: logo_url.to_string(),
        };
        self.store
            .put(&paths::channel(&channel.id)?, encode(&channel)?)
            .await?;
        info!("Channel @{} saved for {}", channel.handle, channel.id);
        Ok(channel)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelViewState {
    pub loading: bool,
    pub error: Option<ViewError>,
    pub channel: Option<Channel>,
    pub projects: Vec<Project>,
    pub follow: FollowState,
    pub notices: Vec<Notice>,
}

impl Default for ChannelViewState {
    fn default() -> Self {
        Self {
            loading: true,
            error: None,
            channel: None,
            projects: Vec::new(),
            follow: FollowState::default(),
            notices: Vec::new(),
        }
    }
}

struct ChannelSnapshot {
    channel: Channel,
    projects: Vec<Project>,
    follower_count: usize,
    is_following: bool,
}

/// A follow toggle applied locally and waiting to be written.
pub struct PendingFollow {
    relations: RelationshipController,
    follower: String,
    channel: String,
    target: bool,
}

impl PendingFollow {
    pub async fn send(&self) -> HubResult<()> {
        self.relations
            .set_following(&self.follower, &self.channel, self.target)
            .await
    }
}

/// State behind one open channel page. Results of a load that finishes after
/// `close()` are dropped.
pub struct ChannelView {
    store: Arc<dyn DocumentStore>,
    viewer: Option<Session>,
    token: CancellationToken,
    state: ChannelViewState,
}

impl ChannelView {
    pub fn new(store: Arc<dyn DocumentStore>, viewer: Option<Session>) -> Self {
        Self {
            store,
            viewer,
            token: CancellationToken::new(),
            state: ChannelViewState::default(),
        }
    }

    pub fn state(&self) -> &ChannelViewState {
        &self.state
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn close(&self) {
        self.token.cancel();
    }

    /// Returns false if the view was closed and the results discarded.
    pub async fn load(&mut self, handle: &str) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        let previous = self.state.clone();
        self.state.loading = true;
        self.state.error = None;

        let token = self.token.clone();
        let viewer = self.viewer.as_ref().map(|s| s.user_id.as_str());
        let fetched = tokio::select! {
            _ = token.cancelled() => None,
            result = fetch_channel(&self.store, viewer, handle) => Some(result),
        };

        let Some(result) = fetched.filter(|_| !token.is_cancelled()) else {
            self.state = previous;
            debug!("Channel view for {} closed, discarding load", handle);
            return false;
        };

        match result {
            Ok(snapshot) => {
                self.state.follow = FollowState::new(snapshot.is_following, snapshot.follower_count);
                self.state.projects = snapshot.projects;
                self.state.channel = Some(snapshot.channel);
            }
            Err(err) => {
                self.state.channel = None;
                self.state.projects.clear();
                self.state.follow = FollowState::default();
                self.state.error = Some(err);
            }
        }
        self.state.loading = false;
        true
    }

    /// Signed in, and looking at someone else's channel.
    pub fn can_follow(&self) -> bool {
        match (&self.viewer, &self.state.channel) {
            (Some(viewer), Some(channel)) => viewer.user_id != channel.id,
            _ => false,
        }
    }

    /// Messaging opens up once the viewer follows the channel.
    pub fn can_message(&self) -> bool {
        self.can_follow() && self.state.follow.is_following
    }

    /// Apply a follow toggle locally. `Ok(None)` means a toggle is already
    /// pending and this one was ignored.
    pub fn begin_toggle_follow(&mut self) -> Result<Option<PendingFollow>, ViewError> {
        let viewer = self
            .viewer
            .as_ref()
            .ok_or_else(|| ViewError::new(ErrorKind::Unauthenticated, "Please sign in to follow channels"))?;
        let channel = self
            .state
            .channel
            .as_ref()
            .ok_or_else(|| ViewError::new(ErrorKind::NotFound, CHANNEL_NOT_FOUND))?;
        if viewer.user_id == channel.id {
            return Err(ViewError::new(
                ErrorKind::PermissionDenied,
                "You cannot follow your own channel",
            ));
        }

        let follower = viewer.user_id.clone();
        let channel = channel.id.clone();
        Ok(self.state.follow.begin_toggle().map(|target| PendingFollow {
            relations: RelationshipController::new(self.store.clone()),
            follower,
            channel,
            target,
        }))
    }

    pub fn finish_toggle_follow(&mut self, pending: PendingFollow, result: HubResult<()>) -> ToggleOutcome {
        if let Err(e) = &result {
            error!("Error toggling follow {} -> {}: {}", pending.follower, pending.channel, e);
        }
        let (outcome, notice) = self.state.follow.settle(pending.target, &result);
        self.state.notices.extend(notice);
        outcome
    }

    pub async fn toggle_follow(&mut self) -> Result<ToggleOutcome, ViewError> {
        let Some(pending) = self.begin_toggle_follow()? else {
            return Ok(ToggleOutcome::Ignored);
        };
        let result = pending.send().await;
        Ok(self.finish_toggle_follow(pending, result))
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.state.notices)
    }
}

async fn fetch_channel(
    store: &Arc<dyn DocumentStore>,
    viewer: Option<&str>,
    handle: &str,
) -> Result<ChannelSnapshot, ViewError> {
    let failed = |e: HubError| {
        error!("Error fetching channel data for {}: {}", handle, e);
        ViewError::from_hub(&e, CHANNEL_LOAD_FAILED)
    };

    let channel = match resolve_handle(store.as_ref(), handle).await {
        Ok(Some(channel)) => channel,
        Ok(None) => return Err(ViewError::new(ErrorKind::NotFound, CHANNEL_NOT_FOUND)),
        Err(e) => return Err(failed(e)),
    };

    let relations = RelationshipController::new(store.clone());
    let membership = async {
        let Some(user) = viewer else {
            return false;
        };
        relations
            .is_following(user, &channel.id)
            .await
            .unwrap_or_else(|e| {
                warn!("Follow check for {} on {} failed: {}", user, channel.id, e);
                false
            })
    };

    let (projects, follower_count, is_following) = tokio::join!(
        public_projects(store.as_ref(), &channel.id),
        relations.follower_count(&channel.id),
        membership,
    );

    Ok(ChannelSnapshot {
        projects: projects.map_err(failed)?,
        follower_count: follower_count.map_err(failed)?,
        is_following,
        channel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_ignore_case_and_at_sign() {
        assert_eq!(normalize_handle("@Foo"), "foo");
        assert_eq!(normalize_handle("foo"), "foo");
        assert_eq!(normalize_handle("  @acme "), "acme");
        assert_eq!(normalize_handle("@"), "");
    }

    #[test]
    fn handle_charset() {
        assert!(valid_handle("acme_dev-1.x"));
        assert!(!valid_handle("has space"));
        assert!(!valid_handle(""));
    }

    #[test]
    fn fresh_view_starts_loading() {
        assert!(ChannelViewState::default().loading);
    }
}
