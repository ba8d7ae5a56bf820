//! Access rules evaluated by `SqliteStore` before every read and write.
//!
//! Writes are checked against the state before the write (or before the
//! whole batch), looked up through the `existing` callback.

use std::collections::BTreeSet;

use devhub_types::query::WriteOp;
use devhub_types::{CollectionPath, DocPath, HubError, HubResult};
use serde_json::Value;

pub fn check_read(actor: Option<&str>, collection: &CollectionPath) -> HubResult<()> {
    let root = collection.as_str().split('/').next().unwrap_or_default();
    if root == "teams" && actor.is_none() {
        return Err(HubError::denied("sign-in required to read teams"));
    }
    Ok(())
}

pub fn check_write<F>(actor: Option<&str>, op: &WriteOp, mut existing: F) -> HubResult<()>
where
    F: FnMut(&DocPath) -> HubResult<Option<Value>>,
{
    let actor = actor.ok_or_else(|| HubError::denied("sign-in required to write"))?;
    let path = op.path();
    let new = match op {
        WriteOp::Put { data, .. } => Some(data),
        WriteOp::Delete { .. } => None,
    };

    match path.segments().as_slice() {
        ["channels", _, "followers", follower] => owner_only(actor, follower, path),
        ["channels", user, "following", _] => owner_only(actor, user, path),
        ["channels", id] | ["profiles", id] => owner_only(actor, id, path),
        ["projects", _] => check_project(actor, path, new, existing(path)?),
        ["teams", _] => check_team(actor, path, new, existing(path)?, &mut existing),
        ["teams", team_id, "invites", invitee] | ["profiles", invitee, "invites", team_id] => {
            if new.is_none() && actor == *invitee {
                return Ok(());
            }
            let team = existing(&devhub_types::path::paths::team(team_id)?)?;
            if team.as_ref().is_some_and(|t| is_member(t, actor)) {
                Ok(())
            } else {
                Err(HubError::denied(format!("{} is not a member of team {}", actor, team_id)))
            }
        }
        _ => Ok(()),
    }
}

fn owner_only(actor: &str, owner: &str, path: &DocPath) -> HubResult<()> {
    if actor == owner {
        Ok(())
    } else {
        Err(HubError::denied(format!("{} cannot write {}", actor, path)))
    }
}

fn field<'a>(data: &'a Value, name: &str) -> Option<&'a str> {
    data.get(name).and_then(Value::as_str)
}

fn is_member(team: &Value, user_id: &str) -> bool {
    team.get("members")
        .and_then(Value::as_object)
        .is_some_and(|m| m.contains_key(user_id))
}

fn without(data: &Value, key: &str) -> Value {
    let mut copy = data.clone();
    if let Some(obj) = copy.as_object_mut() {
        obj.remove(key);
    }
    copy
}

fn likes(data: &Value) -> BTreeSet<&str> {
    data.get("likes")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn only_own_like_changed(actor: &str, old: &Value, new: &Value) -> bool {
    let (before, after) = (likes(old), likes(new));
    before.symmetric_difference(&after).all(|id| *id == actor)
}

fn check_project(actor: &str, path: &DocPath, new: Option<&Value>, old: Option<Value>) -> HubResult<()> {
    let Some(new) = new else {
        return Err(HubError::denied(format!("projects cannot be deleted ({})", path)));
    };

    let owns_new = field(new, "userId") == Some(actor);
    let owns_old = old.as_ref().is_none_or(|o| field(o, "userId") == Some(actor));
    if owns_new && owns_old {
        return Ok(());
    }

    // Anyone signed in may add or remove their own like on an existing
    // project.
    if let Some(old) = old {
        if without(&old, "likes") == without(new, "likes")
            && only_own_like_changed(actor, &old, new)
        {
            return Ok(());
        }
    }

    Err(HubError::denied(format!("{} does not own {}", actor, path)))
}

fn check_team<F>(
    actor: &str,
    path: &DocPath,
    new: Option<&Value>,
    old: Option<Value>,
    existing: &mut F,
) -> HubResult<()>
where
    F: FnMut(&DocPath) -> HubResult<Option<Value>>,
{
    let denied = || HubError::denied(format!("{} cannot write {}", actor, path));

    match (old, new) {
        (None, None) => Ok(()),
        (None, Some(new)) => {
            if field(new, "createdBy") == Some(actor) && is_member(new, actor) {
                Ok(())
            } else {
                Err(denied())
            }
        }
        (Some(old), None) => {
            if field(&old, "createdBy") == Some(actor) {
                Ok(())
            } else {
                Err(denied())
            }
        }
        (Some(old), Some(new)) => {
            let creator = field(&old, "createdBy");
            if field(new, "createdBy") != creator || !creator.is_some_and(|c| is_member(new, c)) {
                return Err(denied());
            }
            if is_member(&old, actor) {
                return Ok(());
            }
            // Accepting an invite: the only change is the invitee joining.
            let invite = devhub_types::path::paths::invite(path.id(), actor)?;
            let joins_self = is_member(new, actor) && {
                let mut expected = old.clone();
                if let (Some(members), Some(role)) = (
                    expected.get_mut("members").and_then(Value::as_object_mut),
                    new.get("members").and_then(|m| m.get(actor)),
                ) {
                    members.insert(actor.to_string(), role.clone());
                }
                expected == *new
            };
            if joins_self && existing(&invite)?.is_some() {
                Ok(())
            } else {
                Err(denied())
            }
        }
    }
}
