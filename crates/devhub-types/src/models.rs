use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Record;
use crate::error::{HubError, HubResult};

/// Authenticated identity of the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub email: String,
}

/// Public creator profile. The channel id is the owning user's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub handle: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo_url: String,
}

impl Record for Channel {
    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(skip)]
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail_url: String,
    pub user_id: String,
    pub visibility: Visibility,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub programming_languages: Vec<String>,
    /// User ids that liked the project.
    #[serde(default)]
    pub likes: Vec<String>,
    /// Epoch milliseconds on the wire so listings sort numerically.
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl Record for Project {
    fn set_id(&mut self, id: &str) {
        self.project_id = id.to_string();
    }
}

/// One half of a follow edge. Stored under both
/// `channels/{followee}/followers/{follower}` and
/// `channels/{follower}/following/{followee}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowRecord {
    pub timestamp: DateTime<Utc>,
}

impl Record for FollowRecord {}

impl FollowRecord {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_url: String,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// user id -> role
    pub members: BTreeMap<String, String>,
}

impl Record for Team {
    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }
}

impl Team {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.contains_key(user_id)
    }

    /// A usable team has a name, and its creator appears in the member map.
    pub fn validate(&self) -> HubResult<()> {
        if self.name.trim().is_empty() {
            return Err(HubError::malformed(format!("team {} has no name", self.id)));
        }
        if !self.members.contains_key(&self.created_by) {
            return Err(HubError::malformed(format!(
                "team {} creator {} missing from member map",
                self.id, self.created_by
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
}

impl Record for Profile {}

/// Pending invitation of a user into a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub team_id: String,
    pub team_name: String,
    pub invited_by: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl Record for Invite {}

/// A team member as shown in a member list. Derived from the member map
/// and the `profiles` collection, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub photo_url: String,
    pub role: String,
    pub last_active: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::path::paths;
    use serde_json::json;

    #[test]
    fn channel_takes_id_from_path() {
        let doc = Document::new(
            paths::channel("u1").unwrap(),
            json!({ "name": "Acme", "handle": "acme", "logoUrl": "a.png" }),
        );
        let channel: Channel = doc.decode().unwrap();
        assert_eq!(channel.id, "u1");
        assert_eq!(channel.logo_url, "a.png");
        assert_eq!(channel.description, "");
    }

    #[test]
    fn team_without_members_is_malformed() {
        let doc = Document::new(paths::team("t1").unwrap(), json!({ "name": "x", "createdBy": "u1" }));
        let err = doc.decode::<Team>().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Malformed);
    }

    #[test]
    fn team_validation_requires_creator_membership() {
        let mut team = Team {
            id: "t1".into(),
            name: "Core".into(),
            bio: String::new(),
            profile_url: String::new(),
            created_by: "u1".into(),
            created_at: None,
            members: BTreeMap::new(),
        };
        assert!(team.validate().is_err());
        team.members.insert("u1".into(), "owner".into());
        assert!(team.validate().is_ok());
        team.name = "  ".into();
        assert!(team.validate().is_err());
    }

    #[test]
    fn profile_uses_storage_field_names() {
        let profile: Profile =
            serde_json::from_value(json!({ "uid": "u1", "displayName": "Ada", "photoURL": "p.png" }))
                .unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Ada"));
        assert_eq!(profile.photo_url.as_deref(), Some("p.png"));
    }
}
