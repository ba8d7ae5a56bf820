//! Team membership gate, applied before any team-scoped view renders.

use devhub_types::ErrorKind;
use devhub_types::models::Team;

use crate::error::ViewError;

pub const SIGN_IN_REQUIRED: &str = "Please sign in to view team details";
pub const TEAM_NOT_FOUND: &str = "Team not found. Please check the team ID and try again.";
pub const NOT_A_MEMBER: &str = "You do not have permission to view this team";

/// True iff `user_id` is a key of the team's member map.
pub fn can_view(team: &Team, user_id: &str) -> bool {
    team.has_member(user_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamAccess {
    Allowed,
    SignedOut,
    Missing,
    NotMember,
}

impl TeamAccess {
    pub fn check(viewer: Option<&str>, team: Option<&Team>) -> Self {
        match (viewer, team) {
            (None, _) => Self::SignedOut,
            (Some(_), None) => Self::Missing,
            (Some(user_id), Some(team)) if can_view(team, user_id) => Self::Allowed,
            (Some(_), Some(_)) => Self::NotMember,
        }
    }

    pub fn into_result(self) -> Result<(), ViewError> {
        match self {
            Self::Allowed => Ok(()),
            Self::SignedOut => Err(ViewError::new(ErrorKind::Unauthenticated, SIGN_IN_REQUIRED)),
            Self::Missing => Err(ViewError::new(ErrorKind::NotFound, TEAM_NOT_FOUND)),
            Self::NotMember => Err(ViewError::new(ErrorKind::PermissionDenied, NOT_A_MEMBER)),
        }
    }
}

/// Pass the team through the gate, or return the refusal to render.
pub fn admit(viewer: Option<&str>, team: Option<Team>) -> Result<Team, ViewError> {
    TeamAccess::check(viewer, team.as_ref()).into_result()?;
    team.ok_or_else(|| ViewError::new(ErrorKind::NotFound, TEAM_NOT_FOUND))
}
