pub mod cache;
pub mod provider;
pub mod session;

pub use cache::{FileSessionCache, MemorySessionCache, SessionCache};
pub use provider::{AuthBackend, LocalAuth};
pub use session::SessionHolder;
