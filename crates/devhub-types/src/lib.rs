pub mod claims;
pub mod document;
pub mod error;
pub mod events;
pub mod models;
pub mod path;
pub mod query;

pub use document::{Document, Record};
pub use error::{ErrorKind, HubError, HubResult};
pub use path::{CollectionPath, DocPath};
