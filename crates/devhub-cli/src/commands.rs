use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use tracing::{debug, info};

use devhub_auth::{FileSessionCache, LocalAuth, SessionHolder};
use devhub_db::{Database, DocumentStore, SqliteStore};
use devhub_types::models::{Project, Session, Visibility};
use devhub_types::path::paths;
use devhub_views::{
    ChannelDirectory, ChannelView, NewProject, ProjectCatalog, RelationshipController, TeamDirectory,
    TeamView, ToggleOutcome,
};

use crate::config::Config;
use crate::render;

/// Everything a command needs: the database and the reconciled session.
pub struct Hub {
    db: Arc<Database>,
    session: SessionHolder,
}

impl Hub {
    pub async fn open(config: &Config) -> Result<Self> {
        let db = Arc::new(Database::open(&config.db_path)?);
        let auth = LocalAuth::new(db.clone(), config.jwt_secret.as_str())
            .with_token_ttl(chrono::Duration::days(config.token_ttl_days));
        let cache = FileSessionCache::new(&config.session_cache);
        let session = SessionHolder::start(Arc::new(auth), Arc::new(cache));

        let mut events = session.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                debug!(?event, "session event");
            }
        });

        session.reconcile().await;
        Ok(Self { db, session })
    }

    /// Store handle acting as whoever is signed in right now.
    fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::new(SqliteStore::new(self.db.clone(), self.session.user_id()))
    }

    fn require(&self) -> Result<Session> {
        Ok(self.session.require()?)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<()> {
        let session = self.session.sign_up(email, password).await?;
        render::session(Some(&session));
        Ok(())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<()> {
        let session = self.session.sign_in(email, password).await?;
        render::session(Some(&session));
        Ok(())
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.session.sign_out().await;
        render::session(None);
        Ok(())
    }

    pub fn whoami(&self) {
        render::session(self.session.current_session().as_ref());
    }

    // Channels

    pub async fn create_channel(&self, name: &str, handle: &str, description: &str, logo_url: &str) -> Result<()> {
        let session = self.require()?;
        let channel = ChannelDirectory::new(self.store())
            .create_channel(&session, name, handle, description, logo_url)
            .await?;
        println!("Channel @{} saved", channel.handle);
        Ok(())
    }

    async fn channel_view(&self, handle: &str) -> ChannelView {
        let mut view = ChannelView::new(self.store(), self.session.current_session());
        view.load(handle).await;
        view
    }

    pub async fn show_channel(&self, handle: &str) -> Result<()> {
        let view = self.channel_view(handle).await;
        render::channel(&view);
        Ok(())
    }

    pub async fn set_following(&self, handle: &str, follow: bool) -> Result<()> {
        let mut view = self.channel_view(handle).await;
        if let Some(error) = &view.state().error {
            bail!("{}", error);
        }

        if view.state().follow.is_following == follow {
            println!("{}", if follow { "Already following" } else { "Not following" });
            return Ok(());
        }

        let outcome = view.toggle_follow().await?;
        render::notices(&view.take_notices());
        match outcome {
            ToggleOutcome::Applied(_) => render::channel(&view),
            ToggleOutcome::Ignored => println!("A follow change is already in progress"),
            ToggleOutcome::Reverted => bail!("follow state unchanged"),
        }
        Ok(())
    }

    /// Roll back half-written follow edges of the signed-in user.
    pub async fn repair_follows(&self, channels: &[String]) -> Result<()> {
        let session = self.require()?;
        let repaired = RelationshipController::new(self.store())
            .reconcile_edges(&session.user_id, channels)
            .await?;
        info!("Follow sweep for {} finished", session.user_id);
        println!("Repaired {} follow edge{}", repaired, if repaired == 1 { "" } else { "s" });
        Ok(())
    }

    // Projects

    fn catalog(&self) -> Result<ProjectCatalog> {
        Ok(ProjectCatalog::new(self.store(), self.require()?))
    }

    pub async fn publish_project(&self, draft: NewProject) -> Result<()> {
        let project = self.catalog()?.publish(draft).await?;
        render::project(&project);
        Ok(())
    }

    pub async fn show_project(&self, project_id: &str) -> Result<()> {
        let project: Project = self
            .store()
            .get(&paths::project(project_id)?)
            .await?
            .ok_or_else(|| anyhow!("project {} not found", project_id))?
            .decode()?;
        render::project(&project);
        Ok(())
    }

    pub async fn like_project(&self, project_id: &str) -> Result<()> {
        let liked = self.catalog()?.toggle_like(project_id).await?;
        println!("{}", if liked { "Liked" } else { "Like removed" });
        Ok(())
    }

    pub async fn set_visibility(&self, project_id: &str, visibility: Visibility) -> Result<()> {
        let project = self.catalog()?.set_visibility(project_id, visibility).await?;
        render::project(&project);
        Ok(())
    }

    // Teams

    fn teams(&self) -> Result<TeamDirectory> {
        Ok(TeamDirectory::new(self.store(), self.require()?))
    }

    pub async fn create_team(&self, name: &str, bio: &str) -> Result<()> {
        let team = self.teams()?.create_team(name, bio).await?;
        println!("Created team {} ({})", team.name, team.id);
        Ok(())
    }

    pub async fn show_team(&self, team_id: &str) -> Result<()> {
        let mut view = TeamView::new(self.store(), self.session.current_session());
        view.load(team_id).await;
        render::team(&view);
        Ok(())
    }

    pub async fn invite(&self, team_id: &str, user_id: &str, role: &str) -> Result<()> {
        let invite = self.teams()?.invite(team_id, user_id, role).await?;
        println!("Invited {} to {} as {}", user_id, invite.team_name, invite.role);
        Ok(())
    }

    pub async fn pending_invites(&self) -> Result<()> {
        render::invites(&self.teams()?.pending_invites().await?);
        Ok(())
    }

    pub async fn accept_invite(&self, team_id: &str) -> Result<()> {
        let team = self.teams()?.accept_invite(team_id).await?;
        println!("Joined {}", team.name);
        Ok(())
    }

    pub async fn leave_team(&self, team_id: &str) -> Result<()> {
        self.teams()?.leave_team(team_id).await?;
        println!("Left team {}", team_id);
        Ok(())
    }
}
