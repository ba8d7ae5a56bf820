//! The current user's session, shared explicitly with whoever needs it.
//!
//! Startup is optimistic: a cached session is exposed immediately and
//! confirmed later by `reconcile`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::{info, warn};

use devhub_types::events::SessionEvent;
use devhub_types::models::Session;
use devhub_types::{HubError, HubResult};

use crate::cache::SessionCache;
use crate::provider::AuthBackend;

#[derive(Clone)]
pub struct SessionHolder {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    backend: Arc<dyn AuthBackend>,
    cache: Arc<dyn SessionCache>,
    current: RwLock<Option<Session>>,
    reconciled: AtomicBool,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHolder {
    pub fn start(backend: Arc<dyn AuthBackend>, cache: Arc<dyn SessionCache>) -> Self {
        let cached = cache.load();
        if let Some(session) = &cached {
            info!("Restored cached session for {}", session.email);
        }

        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(SessionInner {
                backend,
                cache,
                current: RwLock::new(cached),
                reconciled: AtomicBool::new(false),
                events,
            }),
        }
    }

    pub fn current_session(&self) -> Option<Session> {
        self.read().clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.user_id.clone())
    }

    pub fn require(&self) -> HubResult<Session> {
        self.current_session().ok_or(HubError::Unauthenticated)
    }

    /// False until the cached session has been confirmed or discarded.
    pub fn is_reconciled(&self) -> bool {
        self.inner.reconciled.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Confirm the cached session with the backend. Any failure counts as
    /// "no session"; this never returns an error.
    pub async fn reconcile(&self) -> Option<Session> {
        let Some(cached) = self.current_session() else {
            self.inner.reconciled.store(true, Ordering::SeqCst);
            return None;
        };

        let verified = match self.inner.backend.verify(&cached.token).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Session reconciliation failed, treating as signed out: {}", e);
                None
            }
        };

        // A sign-in or sign-out may have happened while we were waiting.
        if self.current_session().as_ref() == Some(&cached) {
            self.transition(verified);
        }
        self.inner.reconciled.store(true, Ordering::SeqCst);
        self.current_session()
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> HubResult<Session> {
        let session = self.inner.backend.sign_up(email, password).await?;
        self.transition(Some(session.clone()));
        Ok(session)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> HubResult<Session> {
        let session = self.inner.backend.sign_in(email, password).await?;
        self.transition(Some(session.clone()));
        Ok(session)
    }

    /// Local state is cleared even when the backend call fails.
    pub async fn sign_out(&self) {
        let Some(session) = self.current_session() else {
            return;
        };
        if let Err(e) = self.inner.backend.sign_out(&session.token).await {
            warn!("Backend sign-out failed for {}: {}", session.email, e);
        }
        self.transition(None);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Session>> {
        self.inner.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, next: Option<Session>) {
        let previous = {
            let mut current = self.inner.current.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *current, next.clone())
        };

        match next {
            Some(session) => {
                if let Err(e) = self.inner.cache.store(&session) {
                    warn!("Failed to cache session: {}", e);
                }
                info!("Signed in as {}", session.email);
                let _ = self.inner.events.send(SessionEvent::SignedIn {
                    user_id: session.user_id,
                    email: session.email,
                });
            }
            None => {
                if let Err(e) = self.inner.cache.clear() {
                    warn!("Failed to clear session cache: {}", e);
                }
                if let Some(old) = previous {
                    info!("Signed out {}", old.email);
                    let _ = self.inner.events.send(SessionEvent::SignedOut {
                        user_id: old.user_id,
                    });
                }
            }
        }
    }
}
