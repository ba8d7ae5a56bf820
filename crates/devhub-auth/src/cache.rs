//! Local persistence of the signed-in session across restarts.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use devhub_types::models::Session;
use devhub_types::{HubError, HubResult};
use tracing::warn;

pub trait SessionCache: Send + Sync {
    /// Cached session, if any. Unreadable caches count as empty.
    fn load(&self) -> Option<Session>;

    fn store(&self, session: &Session) -> HubResult<()>;

    fn clear(&self) -> HubResult<()>;
}

/// JSON file cache.
pub struct FileSessionCache {
    path: PathBuf,
}

impl FileSessionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionCache for FileSessionCache {
    fn load(&self) -> Option<Session> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read session cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        serde_json::from_str(&raw)
            .map_err(|e| warn!("Ignoring corrupt session cache {}: {}", self.path.display(), e))
            .ok()
    }

    fn store(&self, session: &Session) -> HubResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(HubError::unavailable)?;
        }
        let raw = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, raw).map_err(HubError::unavailable)
    }

    fn clear(&self) -> HubResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HubError::unavailable(e)),
        }
    }
}

/// Process-local cache, for tests and embedding.
#[derive(Default)]
pub struct MemorySessionCache {
    slot: Mutex<Option<Session>>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }
}

impl SessionCache for MemorySessionCache {
    fn load(&self) -> Option<Session> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn store(&self, session: &Session) -> HubResult<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| HubError::unavailable(format!("session cache lock poisoned: {}", e)))?;
        *slot = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> HubResult<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| HubError::unavailable(format!("session cache lock poisoned: {}", e)))?;
        *slot = None;
        Ok(())
    }
}
