use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{HubError, HubResult};
use crate::path::DocPath;

/// A record as returned by the document store: its path plus raw JSON data.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocPath,
    pub data: Value,
}

/// A typed record. The document id is not part of the stored data; it is
/// injected from the path after decoding.
pub trait Record: Serialize + DeserializeOwned {
    fn set_id(&mut self, _id: &str) {}
}

impl Document {
    pub fn new(path: DocPath, data: Value) -> Self {
        Self { path, data }
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }

    pub fn decode<T: Record>(&self) -> HubResult<T> {
        let mut record: T = serde_json::from_value(self.data.clone())
            .map_err(|e| HubError::malformed(format!("{}: {}", self.path, e)))?;
        record.set_id(self.id());
        Ok(record)
    }

    /// Top-level string field, if present.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

/// Serialize a record into the JSON object stored by the document store.
pub fn encode<T: Record>(record: &T) -> HubResult<Value> {
    Ok(serde_json::to_value(record)?)
}
