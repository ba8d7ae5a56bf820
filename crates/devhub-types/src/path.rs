//! Slash-separated document and collection paths.
//!
//! A document path has an even number of segments (`channels/abc`,
//! `channels/abc/followers/u1`), a collection path an odd number
//! (`channels`, `channels/abc/followers`).

use std::fmt;

use crate::error::{HubError, HubResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

fn check_segments(raw: &str) -> HubResult<usize> {
    let mut count = 0;
    for segment in raw.split('/') {
        if segment.is_empty() {
            return Err(HubError::malformed(format!("empty segment in path '{}'", raw)));
        }
        count += 1;
    }
    Ok(count)
}

fn check_id(id: &str) -> HubResult<()> {
    if id.is_empty() || id.contains('/') {
        return Err(HubError::malformed(format!("invalid document id '{}'", id)));
    }
    Ok(())
}

impl DocPath {
    pub fn parse(raw: &str) -> HubResult<Self> {
        let n = check_segments(raw)?;
        if n % 2 != 0 {
            return Err(HubError::malformed(format!("'{}' is not a document path", raw)));
        }
        Ok(Self(raw.to_string()))
    }

    /// Last segment of the path.
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn collection(&self) -> CollectionPath {
        let (parent, _) = self.0.rsplit_once('/').unwrap_or(("", &self.0));
        CollectionPath(parent.to_string())
    }

    pub fn segments(&self) -> Vec<&str> {
        self.0.split('/').collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl CollectionPath {
    pub fn parse(raw: &str) -> HubResult<Self> {
        let n = check_segments(raw)?;
        if n % 2 == 0 {
            return Err(HubError::malformed(format!("'{}' is not a collection path", raw)));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn doc(&self, id: &str) -> HubResult<DocPath> {
        check_id(id)?;
        Ok(DocPath(format!("{}/{}", self.0, id)))
    }

    /// The document this collection hangs off, `None` for root collections.
    pub fn parent(&self) -> Option<DocPath> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| DocPath(parent.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builders for the collections the platform stores.
pub mod paths {
    use super::{CollectionPath, DocPath, check_id};
    use crate::error::HubResult;

    fn root(name: &str) -> CollectionPath {
        CollectionPath(name.to_string())
    }

    fn sub(parent: &str, id: &str, name: &str) -> HubResult<CollectionPath> {
        check_id(id)?;
        Ok(CollectionPath(format!("{}/{}/{}", parent, id, name)))
    }

    pub fn channels() -> CollectionPath {
        root("channels")
    }

    pub fn channel(id: &str) -> HubResult<DocPath> {
        channels().doc(id)
    }

    /// Users following `channel_id`.
    pub fn followers(channel_id: &str) -> HubResult<CollectionPath> {
        sub("channels", channel_id, "followers")
    }

    pub fn follower(channel_id: &str, user_id: &str) -> HubResult<DocPath> {
        followers(channel_id)?.doc(user_id)
    }

    /// Channels `user_id` follows.
    pub fn following(user_id: &str) -> HubResult<CollectionPath> {
        sub("channels", user_id, "following")
    }

    pub fn followed(user_id: &str, channel_id: &str) -> HubResult<DocPath> {
        following(user_id)?.doc(channel_id)
    }

    pub fn projects() -> CollectionPath {
        root("projects")
    }

    pub fn project(id: &str) -> HubResult<DocPath> {
        projects().doc(id)
    }

    pub fn teams() -> CollectionPath {
        root("teams")
    }

    pub fn team(id: &str) -> HubResult<DocPath> {
        teams().doc(id)
    }

    pub fn invites(team_id: &str) -> HubResult<CollectionPath> {
        sub("teams", team_id, "invites")
    }

    pub fn invite(team_id: &str, user_id: &str) -> HubResult<DocPath> {
        invites(team_id)?.doc(user_id)
    }

    pub fn profiles() -> CollectionPath {
        root("profiles")
    }

    pub fn profile(uid: &str) -> HubResult<DocPath> {
        profiles().doc(uid)
    }

    /// Invitations addressed to `uid`, mirrored from `teams/{t}/invites`.
    pub fn inbox(uid: &str) -> HubResult<CollectionPath> {
        sub("profiles", uid, "invites")
    }

    pub fn inbox_invite(uid: &str, team_id: &str) -> HubResult<DocPath> {
        inbox(uid)?.doc(team_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_path_parts() {
        let p = DocPath::parse("channels/abc/followers/u1").unwrap();
        assert_eq!(p.id(), "u1");
        assert_eq!(p.collection().as_str(), "channels/abc/followers");
        assert_eq!(p.collection().parent().unwrap().as_str(), "channels/abc");
    }

    #[test]
    fn rejects_wrong_parity_and_empty_segments() {
        assert!(DocPath::parse("channels").is_err());
        assert!(CollectionPath::parse("channels/abc").is_err());
        assert!(DocPath::parse("channels//abc").is_err());
        assert!(DocPath::parse("").is_err());
    }

    #[test]
    fn ids_cannot_escape_their_collection() {
        assert!(paths::channel("a/b").is_err());
        assert!(paths::follower("c1", "").is_err());
        assert_eq!(
            paths::followed("u1", "c1").unwrap().as_str(),
            "channels/u1/following/c1"
        );
    }

    #[test]
    fn root_collections_have_no_parent() {
        assert!(paths::teams().parent().is_none());
    }
}
