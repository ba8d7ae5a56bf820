use std::fmt;

use devhub_types::{ErrorKind, HubError};

/// Terminal error state of a view: the failure kind plus the message shown
/// to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ViewError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Keep the failure kind, replace the text.
    pub fn from_hub(err: &HubError, message: impl Into<String>) -> Self {
        Self::new(err.kind(), message)
    }
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ViewError {}

impl From<HubError> for ViewError {
    fn from(err: HubError) -> Self {
        let message = match &err {
            HubError::Unauthenticated => "Please sign in to continue".to_string(),
            HubError::BackendUnavailable(_) => {
                "Service unavailable. Please try again later.".to_string()
            }
            other => other.to_string(),
        };
        Self::new(err.kind(), message)
    }
}
