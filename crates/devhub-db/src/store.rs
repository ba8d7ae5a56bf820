use std::sync::Arc;

use async_trait::async_trait;
use devhub_types::query::{Query, WriteBatch, WriteOp};
use devhub_types::{CollectionPath, DocPath, Document, HubError, HubResult};
use serde_json::Value;
use tracing::{debug, error};

use crate::{Database, queries, rules};

/// Typed facade over the document store. Every operation may fail with
/// `BackendUnavailable` or `PermissionDenied`; nothing is retried.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, query: &Query) -> HubResult<Vec<Document>>;

    async fn get(&self, path: &DocPath) -> HubResult<Option<Document>>;

    async fn put(&self, path: &DocPath, data: Value) -> HubResult<()>;

    async fn delete(&self, path: &DocPath) -> HubResult<()>;

    async fn count(&self, collection: &CollectionPath) -> HubResult<usize> {
        Ok(self.find(&Query::new(collection.clone())).await?.len())
    }

    /// Whether `commit` applies a batch atomically.
    fn supports_transactions(&self) -> bool {
        false
    }

    /// Apply the batch in order. The default stops at the first failure and
    /// leaves earlier writes in place.
    async fn commit(&self, batch: WriteBatch) -> HubResult<()> {
        let total = batch.len();
        for (applied, op) in batch.into_ops().into_iter().enumerate() {
            let path = op.path().clone();
            let result = match op {
                WriteOp::Put { path, data } => self.put(&path, data).await,
                WriteOp::Delete { path } => self.delete(&path).await,
            };
            if let Err(e) = result {
                if applied > 0 {
                    error!(
                        "Batch partially applied: {}/{} writes done, failed at {}: {}",
                        applied, total, path, e
                    );
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Rule-checked store handle bound to one actor (the signed-in user, if any).
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
    actor: Option<String>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>, actor: Option<String>) -> Self {
        Self { db, actor }
    }

    pub fn anonymous(db: Arc<Database>) -> Self {
        Self::new(db, None)
    }

    /// Run blocking DB work off the async runtime.
    async fn run<F, T>(&self, f: F) -> HubResult<T>
    where
        F: FnOnce(&Database, Option<&str>) -> HubResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let actor = self.actor.clone();
        tokio::task::spawn_blocking(move || f(&db, actor.as_deref()))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                HubError::unavailable(e)
            })?
    }
}

/// Recover a `HubError` raised inside a DB closure; anything else is a
/// backend failure.
pub fn into_hub(err: anyhow::Error) -> HubError {
    match err.downcast::<HubError>() {
        Ok(e) => e,
        Err(other) => HubError::unavailable(other),
    }
}

fn check_batch(conn: &rusqlite::Connection, actor: Option<&str>, ops: &[WriteOp]) -> HubResult<()> {
    for op in ops {
        rules::check_write(actor, op, |p| {
            queries::get_document(conn, p)
                .map(|doc| doc.map(|d| d.data))
                .map_err(into_hub)
        })?;
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn find(&self, query: &Query) -> HubResult<Vec<Document>> {
        let query = query.clone();
        self.run(move |db, actor| {
            rules::check_read(actor, &query.collection)?;
            db.find_documents(&query).map_err(into_hub)
        })
        .await
    }

    async fn get(&self, path: &DocPath) -> HubResult<Option<Document>> {
        let path = path.clone();
        self.run(move |db, actor| {
            rules::check_read(actor, &path.collection())?;
            db.get_document(&path).map_err(into_hub)
        })
        .await
    }

    async fn put(&self, path: &DocPath, data: Value) -> HubResult<()> {
        self.commit(WriteBatch::new().put(path.clone(), data)).await
    }

    async fn delete(&self, path: &DocPath) -> HubResult<()> {
        self.commit(WriteBatch::new().delete(path.clone())).await
    }

    async fn count(&self, collection: &CollectionPath) -> HubResult<usize> {
        let collection = collection.clone();
        self.run(move |db, actor| {
            rules::check_read(actor, &collection)?;
            db.count_documents(&collection).map_err(into_hub)
        })
        .await
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    async fn commit(&self, batch: WriteBatch) -> HubResult<()> {
        let ops = batch.into_ops();
        self.run(move |db, actor| {
            db.with_conn_mut(|conn| {
                check_batch(conn, actor, &ops)?;
                queries::apply_batch(conn, &ops)
            })
            .map_err(into_hub)?;
            debug!("Committed {} writes as {:?}", ops.len(), actor);
            Ok(())
        })
        .await
    }
}
