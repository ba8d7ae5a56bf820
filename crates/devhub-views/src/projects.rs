use std::sync::Arc;

use chrono::Utc;
use devhub_db::DocumentStore;
use devhub_types::document::encode;
use devhub_types::models::{Project, Session, Visibility};
use devhub_types::path::paths;
use devhub_types::query::Query;
use devhub_types::{HubError, HubResult};
use tracing::info;
use uuid::Uuid;

/// Public projects of one owner, newest first.
pub async fn public_projects(store: &dyn DocumentStore, owner_id: &str) -> HubResult<Vec<Project>> {
    let query = Query::new(paths::projects())
        .eq("userId", owner_id)
        .eq("visibility", "public")
        .order_by("uploadedAt", true);

    store
        .find(&query)
        .await?
        .iter()
        .map(|doc| doc.decode::<Project>())
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub tags: Vec<String>,
    pub programming_languages: Vec<String>,
    pub private: bool,
}

/// Project operations on behalf of the session user.
pub struct ProjectCatalog {
    store: Arc<dyn DocumentStore>,
    session: Session,
}

impl ProjectCatalog {
    pub fn new(store: Arc<dyn DocumentStore>, session: Session) -> Self {
        Self { store, session }
    }

    pub async fn publish(&self, draft: NewProject) -> HubResult<Project> {
        if draft.title.trim().is_empty() {
            return Err(HubError::malformed("project title is required"));
        }

        let project = Project {
            project_id: Uuid::new_v4().to_string(),
            title: draft.title.trim().to_string(),
            description: draft.description,
            thumbnail_url: draft.thumbnail_url,
            user_id: self.session.user_id.clone(),
            visibility: if draft.private {
                Visibility::Private
            } else {
                Visibility::Public
            },
            tags: draft.tags,
            programming_languages: draft.programming_languages,
            likes: Vec::new(),
            uploaded_at: Some(Utc::now()),
        };

        self.store
            .put(&paths::project(&project.project_id)?, encode(&project)?)
            .await?;
        info!("{} published project {}", project.user_id, project.project_id);
        Ok(project)
    }

    pub async fn get(&self, project_id: &str) -> HubResult<Project> {
        self.store
            .get(&paths::project(project_id)?)
            .await?
            .ok_or_else(|| HubError::not_found(format!("project {}", project_id)))?
            .decode()
    }

    pub async fn set_visibility(&self, project_id: &str, visibility: Visibility) -> HubResult<Project> {
        let mut project = self.get(project_id).await?;
        if project.user_id != self.session.user_id {
            return Err(HubError::denied(format!("project {} belongs to another user", project_id)));
        }
        project.visibility = visibility;
        self.store
            .put(&paths::project(project_id)?, encode(&project)?)
            .await?;
        Ok(project)
    }

    /// Like or unlike. Returns whether the project is now liked.
    pub async fn toggle_like(&self, project_id: &str) -> HubResult<bool> {
        let mut project = self.get(project_id).await?;
        let user = &self.session.user_id;

        let liked = match project.likes.iter().position(|id| id == user) {
            Some(idx) => {
                project.likes.remove(idx);
                false
            }
            None => {
                project.likes.push(user.clone());
                true
            }
        };

        self.store
            .put(&paths::project(project_id)?, encode(&project)?)
            .await?;
        Ok(liked)
    }
}
