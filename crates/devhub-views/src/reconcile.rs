//! Local follow state with optimistic updates.
//!
//! A toggle is applied locally first, then confirmed or reverted once the
//! remote write settles. Only one toggle may be in flight; toggles issued
//! meanwhile are ignored.

use devhub_types::HubResult;
use devhub_types::events::Notice;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowState {
    pub is_following: bool,
    pub follower_count: usize,
    /// A toggle is waiting for remote confirmation.
    pub pending: bool,
    /// `(is_following, follower_count)` before the pending toggle.
    before: Option<(bool, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The write landed; carries the new `is_following`.
    Applied(bool),
    /// Another toggle was still pending.
    Ignored,
    /// The write failed and the local change was undone.
    Reverted,
}

impl FollowState {
    pub fn new(is_following: bool, follower_count: usize) -> Self {
        Self {
            is_following,
            follower_count,
            pending: false,
            before: None,
        }
    }

    /// Apply the toggle locally. Returns the target `is_following`, or `None`
    /// if a toggle is already pending.
    pub fn begin_toggle(&mut self) -> Option<bool> {
        if self.pending {
            return None;
        }
        let target = !self.is_following;
        self.before = Some((self.is_following, self.follower_count));
        self.apply(target);
        self.pending = true;
        Some(target)
    }

    /// Settle a pending toggle. On failure the state from before the toggle
    /// is restored and a notice describing it is returned.
    pub fn settle(&mut self, target: bool, result: &HubResult<()>) -> (ToggleOutcome, Option<Notice>) {
        self.pending = false;
        let before = self.before.take();
        match result {
            Ok(()) => (ToggleOutcome::Applied(target), None),
            Err(e) => {
                match before {
                    Some((is_following, follower_count)) => {
                        self.is_following = is_following;
                        self.follower_count = follower_count;
                    }
                    None => self.apply(!target),
                }
                let action = if target { "follow" } else { "unfollow" };
                (
                    ToggleOutcome::Reverted,
                    Some(Notice::error(format!("Could not {} this channel: {}", action, e))),
                )
            }
        }
    }

    fn apply(&mut self, following: bool) {
        if following == self.is_following {
            return;
        }
        self.is_following = following;
        if following {
            self.follower_count += 1;
        } else {
            self.follower_count = self.follower_count.saturating_sub(1);
        }
    }
}
