#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use devhub_db::{Database, DocumentStore, SqliteStore};
use devhub_types::models::Session;
use devhub_types::query::Query;
use devhub_types::{CollectionPath, DocPath, Document, HubError, HubResult};
use serde_json::Value;
use tokio::sync::Notify;

pub struct Hub {
    pub db: Arc<Database>,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            db: Arc::new(Database::open_in_memory().unwrap()),
        }
    }

    pub fn store_as(&self, user_id: &str) -> Arc<dyn DocumentStore> {
        Arc::new(SqliteStore::new(self.db.clone(), Some(user_id.to_string())))
    }

    pub fn anonymous(&self) -> Arc<dyn DocumentStore> {
        Arc::new(SqliteStore::anonymous(self.db.clone()))
    }
}

pub fn session(user_id: &str) -> Session {
    Session {
        token: format!("token-{}", user_id),
        user_id: user_id.to_string(),
        email: format!("{}@example.com", user_id),
    }
}

/// Wraps a store, records every path it is asked about, fails operations
/// under chosen path prefixes, and can park `find` calls forever. Commits
/// go through the trait's sequential default, so batches are not atomic.
pub struct FlakyStore {
    inner: Arc<dyn DocumentStore>,
    failing: Mutex<Vec<String>>,
    touched: Mutex<Vec<String>>,
    hold_finds: Option<Arc<Notify>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            failing: Mutex::new(Vec::new()),
            touched: Mutex::new(Vec::new()),
            hold_finds: None,
        }
    }

    pub fn holding_finds(mut self) -> Self {
        self.hold_finds = Some(Arc::new(Notify::new()));
        self
    }

    pub fn fail_under(&self, prefix: &str) {
        self.failing.lock().unwrap().push(prefix.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn touched_under(&self, prefix: &str) -> usize {
        self.touched
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.starts_with(prefix))
            .count()
    }

    pub fn touched_total(&self) -> usize {
        self.touched.lock().unwrap().len()
    }

    fn visit(&self, path: &str) -> HubResult<()> {
        self.touched.lock().unwrap().push(path.to_string());
        let failing = self.failing.lock().unwrap();
        if failing.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            return Err(HubError::unavailable(format!("injected failure at {}", path)));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn find(&self, query: &Query) -> HubResult<Vec<Document>> {
        self.visit(query.collection.as_str())?;
        if let Some(hold) = &self.hold_finds {
            hold.notified().await;
        }
        self.inner.find(query).await
    }

    async fn get(&self, path: &DocPath) -> HubResult<Option<Document>> {
        self.visit(path.as_str())?;
        self.inner.get(path).await
    }

    async fn put(&self, path: &DocPath, data: Value) -> HubResult<()> {
        self.visit(path.as_str())?;
        self.inner.put(path, data).await
    }

    async fn delete(&self, path: &DocPath) -> HubResult<()> {
        self.visit(path.as_str())?;
        self.inner.delete(path).await
    }

    async fn count(&self, collection: &CollectionPath) -> HubResult<usize> {
        self.visit(collection.as_str())?;
        self.inner.count(collection).await
    }
}
