pub mod channel;
pub mod error;
pub mod follow;
pub mod gate;
pub mod projects;
pub mod reconcile;
pub mod team;

pub use channel::{ChannelDirectory, ChannelView, ChannelViewState, normalize_handle};
pub use error::ViewError;
pub use follow::RelationshipController;
pub use gate::{TeamAccess, can_view};
pub use projects::{NewProject, ProjectCatalog};
pub use reconcile::{FollowState, ToggleOutcome};
pub use team::{TeamDirectory, TeamView, TeamViewState};
