//! Team pages and team membership changes.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use devhub_db::DocumentStore;
use devhub_types::document::encode;
use devhub_types::models::{Invite, Profile, Session, Team, TeamMember};
use devhub_types::path::paths;
use devhub_types::query::{Query, WriteBatch};
use devhub_types::{ErrorKind, HubError, HubResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::ViewError;
use crate::gate::{SIGN_IN_REQUIRED, admit};

pub const INVALID_TEAM: &str = "Invalid team data structure";
pub const TEAM_LOAD_FAILED: &str = "Failed to load team data. Please try again later.";

#[derive(Debug, Clone, PartialEq)]
pub struct TeamViewState {
    pub loading: bool,
    pub error: Option<ViewError>,
    pub team: Option<Team>,
    pub members: Vec<TeamMember>,
}

impl Default for TeamViewState {
    fn default() -> Self {
        Self {
            loading: true,
            error: None,
            team: None,
            members: Vec::new(),
        }
    }
}

pub struct TeamView {
    store: Arc<dyn DocumentStore>,
    viewer: Option<Session>,
    token: CancellationToken,
    state: TeamViewState,
}

impl TeamView {
    pub fn new(store: Arc<dyn DocumentStore>, viewer: Option<Session>) -> Self {
        Self {
            store,
            viewer,
            token: CancellationToken::new(),
            state: TeamViewState::default(),
        }
    }

    pub fn state(&self) -> &TeamViewState {
        &self.state
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn member_count(&self) -> usize {
        self.state.team.as_ref().map_or(0, |t| t.members.len())
    }

    /// Returns false if the view was closed and the results discarded.
    pub async fn load(&mut self, team_id: &str) -> bool {
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
            result = fetch_team(self.store.as_ref(), viewer, team_id) => Some(result),
        };

        let Some(result) = fetched.filter(|_| !token.is_cancelled()) else {
            self.state = previous;
            debug!("Team view for {} closed, discarding load", team_id);
            return false;
        };

        match result {
            Ok((team, members)) => {
                self.state.team = Some(team);
                self.state.members = members;
            }
            Err(err) => {
                self.state.team = None;
                self.state.members.clear();
                self.state.error = Some(err);
            }
        }
        self.state.loading = false;
        true
    }
}

async fn fetch_team(
    store: &dyn DocumentStore,
    viewer: Option<&str>,
    team_id: &str,
) -> Result<(Team, Vec<TeamMember>), ViewError> {
    // Signed-out visitors never reach the backend.
    if viewer.is_none() {
        return Err(ViewError::new(ErrorKind::Unauthenticated, SIGN_IN_REQUIRED));
    }

    let failed = |e: HubError| {
        error!("Error fetching team data for {}: {}", team_id, e);
        ViewError::from_hub(&e, TEAM_LOAD_FAILED)
    };

    let doc = store
        .get(&paths::team(team_id).map_err(failed)?)
        .await
        .map_err(failed)?;
    let team = doc
        .map(|d| {
            let team = d.decode::<Team>()?;
            team.validate()?;
            Ok::<_, HubError>(team)
        })
        .transpose()
        .map_err(|e| {
            error!("Team {} has invalid data: {}", team_id, e);
            ViewError::new(ErrorKind::Malformed, INVALID_TEAM)
        })?;

    let team = admit(viewer, team)?;
    let members = project_members(store, &team.members).await.map_err(failed)?;
    Ok((team, members))
}

/// Join the member map against `profiles`. Members without a profile are
/// left out.
pub async fn project_members(
    store: &dyn DocumentStore,
    member_map: &BTreeMap<String, String>,
) -> HubResult<Vec<TeamMember>> {
    if member_map.is_empty() {
        return Ok(Vec::new());
    }

    let query = Query::new(paths::profiles()).within("uid", member_map.keys().cloned());
    let profiles = store.find(&query).await?;

    profiles
        .iter()
        .map(|doc| -> HubResult<TeamMember> {
            let profile: Profile = doc.decode()?;
            let id = doc.id().to_string();
            Ok(TeamMember {
                name: profile
                    .display_name
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| "Anonymous".to_string()),
                photo_url: profile.photo_url.unwrap_or_default(),
                role: member_map
                    .get(&id)
                    .filter(|r| !r.is_empty())
                    .cloned()
                    .unwrap_or_else(|| "member".to_string()),
                last_active: profile.last_active,
                id,
            })
        })
        .collect()
}

/// Team creation and membership changes on behalf of the session user.
pub struct TeamDirectory {
    store: Arc<dyn DocumentStore>,
    session: Session,
}

impl TeamDirectory {
    pub fn new(store: Arc<dyn DocumentStore>, session: Session) -> Self {
        Self { store, session }
    }

    async fn load_team(&self, team_id: &str) -> HubResult<Team> {
        let team: Team = self
            .store
            .get(&paths::team(team_id)?)
            .await?
            .ok_or_else(|| HubError::not_found(format!("team {}", team_id)))?
            .decode()?;
        team.validate()?;
        Ok(team)
    }

    pub async fn create_team(&self, name: &str, bio: &str) -> HubResult<Team> {
        if name.trim().is_empty() {
            return Err(HubError::malformed("team name is required"));
        }

        let owner = self.session.user_id.clone();
        let team = Team {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            bio: bio.to_string(),
            profile_url: String::new(),
            created_by: owner.clone(),
            created_at: Some(Utc::now()),
            members: BTreeMap::from([(owner, "owner".to_string())]),
        };

        self.store.put(&paths::team(&team.id)?, encode(&team)?).await?;
        info!("{} created team {} ({})", team.created_by, team.name, team.id);
        Ok(team)
    }

    /// Invite `invitee` into the team. Writes the team-side invite and the
    /// invitee's inbox copy together.
    pub async fn invite(&self, team_id: &str, invitee: &str, role: &str) -> HubResult<Invite> {
        let team = self.load_team(team_id).await?;
        if !team.has_member(&self.session.user_id) {
            return Err(HubError::denied(format!("not a member of team {}", team_id)));
        }
        if team.has_member(invitee) {
            return Err(HubError::denied(format!("{} is already a member", invitee)));
        }

        let invite = Invite {
            team_id: team.id.clone(),
            team_name: team.name.clone(),
            invited_by: self.session.user_id.clone(),
            role: if role.is_empty() { "member".to_string() } else { role.to_string() },
            created_at: Utc::now(),
        };
        let record = encode(&invite)?;
        let batch = WriteBatch::new()
            .put(paths::invite(team_id, invitee)?, record.clone())
            .put(paths::inbox_invite(invitee, team_id)?, record);
        self.store.commit(batch).await?;

        info!("{} invited {} to team {}", invite.invited_by, invitee, team_id);
        Ok(invite)
    }

    /// Invitations addressed to the session user.
    pub async fn pending_invites(&self) -> HubResult<Vec<Invite>> {
        self.store
            .find(&Query::new(paths::inbox(&self.session.user_id)?).order_by("createdAt", false))
            .await?
            .iter()
            .map(|doc| doc.decode::<Invite>())
            .collect()
    }

    pub async fn accept_invite(&self, team_id: &str) -> HubResult<Team> {
        let me = self.session.user_id.clone();
        let invite: Invite = self
            .store
            .get(&paths::invite(team_id, &me)?)
            .await?
            .ok_or_else(|| HubError::not_found(format!("invite to team {}", team_id)))?
            .decode()?;

        let mut team = self.load_team(team_id).await?;
        team.members.insert(me.clone(), invite.role);

        let batch = WriteBatch::new()
            .put(paths::team(team_id)?, encode(&team)?)
            .delete(paths::invite(team_id, &me)?)
            .delete(paths::inbox_invite(&me, team_id)?);
        self.store.commit(batch).await?;

        info!("{} joined team {}", me, team_id);
        Ok(team)
    }

    /// Leave a team. The creator cannot leave.
    pub async fn leave_team(&self, team_id: &str) -> HubResult<()> {
        let me = &self.session.user_id;
        let mut team = self.load_team(team_id).await?;
        if team.created_by == *me {
            return Err(HubError::denied("the team creator cannot leave the team"));
        }
        if team.members.remove(me).is_none() {
            return Err(HubError::not_found(format!("{} in team {}", me, team_id)));
        }

        self.store.put(&paths::team(team_id)?, encode(&team)?).await?;
        info!("{} left team {}", me, team_id);
        Ok(())
    }
}
