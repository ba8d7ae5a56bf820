use thiserror::Error;

pub type HubResult<T> = Result<T, HubError>;

/// Coarse classification used by the view layer to pick a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    Unauthenticated,
    BackendUnavailable,
    Malformed,
}

#[derive(Debug, Error)]
pub enum HubError {
    /// Entity absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authenticated but not authorized
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// No session
    #[error("Not signed in")]
    Unauthenticated,

    /// Transient backend failure. Never retried automatically.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Stored record or caller input has the wrong shape
    #[error("Malformed: {0}")]
    Malformed(String),
}

impl HubError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::Malformed(_) => ErrorKind::Malformed,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied(reason.into())
    }

    pub fn unavailable(reason: impl ToString) -> Self {
        Self::BackendUnavailable(reason.to_string())
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::Malformed(err.to_string())
    }
}
