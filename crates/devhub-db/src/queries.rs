use anyhow::{Result, anyhow};
use devhub_types::query::{Filter, Query, WriteOp};
use devhub_types::{CollectionPath, DocPath, Document, HubError};
use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use crate::Database;
use crate::models::{DocumentRow, UserRow};

impl Database {
    // -- Users --

    /// Insert a user and their profile document in one transaction. A taken
    /// email is `PermissionDenied`.
    pub fn register_user(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        profile: &DocPath,
        profile_data: &Value,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO users (id, email, password) VALUES (?1, ?2, ?3)",
                (id, email, password_hash),
            );
            match inserted {
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Err(HubError::denied("email already registered").into());
                }
                other => {
                    other?;
                }
            }
            put_document(&tx, profile, profile_data)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn revoke_token(&self, jti: &str, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO revoked_tokens (jti, user_id) VALUES (?1, ?2)",
                (jti, user_id),
            )?;
            Ok(())
        })
    }

    pub fn is_token_revoked(&self, jti: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let hit = conn
                .query_row("SELECT 1 FROM revoked_tokens WHERE jti = ?1", [jti], |_| Ok(()))
                .optional()?;
            Ok(hit.is_some())
        })
    }

    // -- Documents --
    //
    // These bypass access rules; `SqliteStore` is the rule-checked entry point.

    pub fn get_document(&self, path: &DocPath) -> Result<Option<Document>> {
        self.with_conn(|conn| get_document(conn, path))
    }

    pub fn put_document(&self, path: &DocPath, data: &Value) -> Result<()> {
        self.with_conn(|conn| put_document(conn, path, data))
    }

    pub fn delete_document(&self, path: &DocPath) -> Result<()> {
        self.with_conn(|conn| delete_document(conn, path))
    }

    pub fn find_documents(&self, query: &Query) -> Result<Vec<Document>> {
        self.with_conn(|conn| find_documents(conn, query))
    }

    pub fn count_documents(&self, collection: &CollectionPath) -> Result<usize> {
        self.with_conn(|conn| count_documents(conn, collection))
    }

    /// Apply all writes in one SQL transaction.
    pub fn apply_batch(&self, ops: &[WriteOp]) -> Result<()> {
        self.with_conn_mut(|conn| apply_batch(conn, ops))
    }
}

pub(crate) fn get_document(conn: &Connection, path: &DocPath) -> Result<Option<Document>> {
    let row = conn
        .query_row(
            "SELECT path, data FROM documents WHERE path = ?1",
            [path.as_str()],
            |row| {
                Ok(DocumentRow {
                    path: row.get(0)?,
                    data: row.get(1)?,
                })
            },
        )
        .optional()?;

    row.map(into_document).transpose()
}

pub(crate) fn put_document(conn: &Connection, path: &DocPath, data: &Value) -> Result<()> {
    if !data.is_object() {
        return Err(HubError::malformed(format!("{} must be a JSON object", path)).into());
    }
    conn.execute(
        "INSERT INTO documents (path, collection, doc_id, data, updated_at)
         VALUES (?1, ?2, ?3, ?4, datetime('now'))
         ON CONFLICT(path) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        (
            path.as_str(),
            path.collection().as_str(),
            path.id(),
            serde_json::to_string(data)?,
        ),
    )?;
    Ok(())
}

pub(crate) fn delete_document(conn: &Connection, path: &DocPath) -> Result<()> {
    conn.execute("DELETE FROM documents WHERE path = ?1", [path.as_str()])?;
    Ok(())
}

pub(crate) fn count_documents(conn: &Connection, collection: &CollectionPath) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE collection = ?1",
        [collection.as_str()],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

pub(crate) fn find_documents(conn: &Connection, query: &Query) -> Result<Vec<Document>> {
    if query.is_empty_match() {
        return Ok(vec![]);
    }

    let mut sql = String::from("SELECT path, data FROM documents WHERE collection = ?");
    let mut params: Vec<SqlValue> = vec![SqlValue::Text(query.collection.as_str().to_string())];

    for filter in &query.filters {
        match filter {
            Filter::Eq { field, value } => {
                sql.push_str(" AND json_extract(data, ?) IS ?");
                params.push(SqlValue::Text(json_path(field)?));
                params.push(sql_value(value));
            }
            Filter::In { field, values } => {
                let placeholders = vec!["?"; values.len()].join(", ");
                sql.push_str(&format!(" AND json_extract(data, ?) IN ({})", placeholders));
                params.push(SqlValue::Text(json_path(field)?));
                params.extend(values.iter().map(sql_value));
            }
        }
    }

    match &query.order_by {
        Some(order) => {
            let dir = if order.descending { "DESC" } else { "ASC" };
            sql.push_str(&format!(" ORDER BY json_extract(data, ?) {}, doc_id ASC", dir));
            params.push(SqlValue::Text(json_path(&order.field)?));
        }
        None => sql.push_str(" ORDER BY doc_id ASC"),
    }

    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        params.push(SqlValue::Integer(limit as i64));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok(DocumentRow {
                path: row.get(0)?,
                data: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(into_document).collect()
}

pub(crate) fn apply_batch(conn: &mut Connection, ops: &[WriteOp]) -> Result<()> {
    let tx = conn.transaction()?;
    for op in ops {
        match op {
            WriteOp::Put { path, data } => put_document(&tx, path, data)?,
            WriteOp::Delete { path } => delete_document(&tx, path)?,
        }
    }
    tx.commit()?;
    Ok(())
}

fn into_document(row: DocumentRow) -> Result<Document> {
    let path = DocPath::parse(&row.path)?;
    let data = serde_json::from_str(&row.data)
        .map_err(|e| anyhow!(HubError::malformed(format!("{}: {}", row.path, e))))?;
    Ok(Document::new(path, data))
}

/// Only plain top-level field names can be filtered on.
fn json_path(field: &str) -> Result<String> {
    let valid = !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(HubError::malformed(format!("unsupported filter field '{}'", field)).into());
    }
    Ok(format!("$.{}", field))
}

/// Map a JSON value onto what SQLite's `json_extract` yields for it.
fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, email, password, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devhub_types::path::paths;
    use serde_json::json;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn put_then_get_overwrites() {
        let db = db();
        let path = paths::channel("u1").unwrap();
        db.put_document(&path, &json!({ "handle": "a" })).unwrap();
        db.put_document(&path, &json!({ "handle": "b" })).unwrap();

        let doc = db.get_document(&path).unwrap().unwrap();
        assert_eq!(doc.str_field("handle"), Some("b"));
        assert_eq!(db.count_documents(&paths::channels()).unwrap(), 1);
    }

    #[test]
    fn subcollections_are_separate_from_parent() {
        let db = db();
        db.put_document(&paths::channel("c1").unwrap(), &json!({})).unwrap();
        db.put_document(&paths::follower("c1", "u1").unwrap(), &json!({})).unwrap();
        db.put_document(&paths::follower("c1", "u2").unwrap(), &json!({})).unwrap();

        assert_eq!(db.count_documents(&paths::channels()).unwrap(), 1);
        assert_eq!(db.count_documents(&paths::followers("c1").unwrap()).unwrap(), 2);
    }

    #[test]
    fn find_filters_by_eq_and_in() {
        let db = db();
        for (id, owner, vis) in [("p1", "u1", "public"), ("p2", "u1", "private"), ("p3", "u2", "public")] {
            db.put_document(
                &paths::project(id).unwrap(),
                &json!({ "userId": owner, "visibility": vis, "title": id }),
            )
            .unwrap();
        }

        let q = Query::new(paths::projects()).eq("userId", "u1").eq("visibility", "public");
        let ids: Vec<String> = db.find_documents(&q).unwrap().iter().map(|d| d.id().to_string()).collect();
        assert_eq!(ids, vec!["p1"]);

        let q = Query::new(paths::projects()).within("userId", vec!["u1", "u2"]);
        assert_eq!(db.find_documents(&q).unwrap().len(), 3);
    }

    #[test]
    fn find_orders_and_limits() {
        let db = db();
        for (id, rank) in [("a", 3), ("b", 1), ("c", 2)] {
            db.put_document(&paths::profile(id).unwrap(), &json!({ "uid": id, "rank": rank }))
                .unwrap();
        }
        let q = Query::new(paths::profiles()).order_by("rank", true).limit(2);
        let ids: Vec<String> = db.find_documents(&q).unwrap().iter().map(|d| d.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn rejects_unsafe_field_names() {
        let db = db();
        let q = Query::new(paths::projects()).eq("x') OR 1=1 --", "y");
        assert!(db.find_documents(&q).is_err());
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let db = db();
        let good = paths::follower("c1", "u1").unwrap();
        let ops = vec![
            WriteOp::Put { path: good.clone(), data: json!({}) },
            // non-object data fails the second write
            WriteOp::Put { path: paths::followed("u1", "c1").unwrap(), data: json!(5) },
        ];
        assert!(db.apply_batch(&ops).is_err());
        assert!(db.get_document(&good).unwrap().is_none());
    }

    #[test]
    fn registering_a_taken_email_is_denied() {
        let db = db();
        let profile = paths::profile("u1").unwrap();
        db.register_user("u1", "a@b.c", "hash", &profile, &json!({ "uid": "u1" }))
            .unwrap();

        let err = db
            .register_user("u2", "a@b.c", "hash", &paths::profile("u2").unwrap(), &json!({ "uid": "u2" }))
            .unwrap_err();
        let err = crate::into_hub(err);
        assert_eq!(err.kind(), devhub_types::ErrorKind::PermissionDenied);
        assert!(db.get_user_by_id("u2").unwrap().is_none());
    }

    #[test]
    fn failed_profile_write_rolls_back_the_user() {
        let db = db();
        let profile = paths::profile("u1").unwrap();
        assert!(db.register_user("u1", "a@b.c", "hash", &profile, &json!("not an object")).is_err());
        assert!(db.get_user_by_email("a@b.c").unwrap().is_none());
        assert!(db.get_document(&profile).unwrap().is_none());
    }

    #[test]
    fn revoked_tokens_are_remembered() {
        let db = db();
        db.register_user("u1", "a@b.c", "hash", &paths::profile("u1").unwrap(), &json!({}))
            .unwrap();
        assert!(!db.is_token_revoked("j1").unwrap());
        db.revoke_token("j1", "u1").unwrap();
        db.revoke_token("j1", "u1").unwrap();
        assert!(db.is_token_revoked("j1").unwrap());
    }
}
