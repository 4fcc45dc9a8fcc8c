//! Resource registry: resource id -> live media session.
//!
//! The only shared mutable state in the gateway. A session is reachable here
//! from the moment the orchestrator registers it (before the start phase)
//! until the orchestrator removes it (start failure or end of session). It
//! is deliberately absent while the answer is being produced: administrative
//! operations racing the registration window observe "not found", which is a
//! documented precondition rather than a bug.
//!
//! The lock is held only for map access, never across a call into a session
//! handler.

use crate::media::MediaSession;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

struct Entry {
    handler: Arc<dyn MediaSession>,
    registered_at: DateTime<Utc>,
}

/// Concurrency-safe map of resource ids to session handlers.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Entry>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A poisoned lock means a panicking thread died mid-access; the map
        // itself is still usable.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a session under its resource id. Last write wins on collision;
    /// ids are generated globally unique, so a collision is logged as an
    /// anomaly.
    pub fn register(&self, resource_id: &str, handler: Arc<dyn MediaSession>) {
        let entry = Entry {
            handler,
            registered_at: Utc::now(),
        };
        let replaced = self.locked().insert(resource_id.to_string(), entry);
        if replaced.is_some() {
            warn!(
                target: "whip.registry",
                resource_id = %resource_id,
                "resource id collision, previous session replaced"
            );
        }
    }

    /// Look a session up by resource id.
    #[must_use]
    pub fn lookup(&self, resource_id: &str) -> Option<Arc<dyn MediaSession>> {
        self.locked()
            .get(resource_id)
            .map(|entry| Arc::clone(&entry.handler))
    }

    /// Remove a session. No-op if absent; returns whether an entry was
    /// removed so callers can meter accurately.
    pub fn remove(&self, resource_id: &str) -> bool {
        let removed = self.locked().remove(resource_id);
        if let Some(entry) = removed {
            let session_seconds = (Utc::now() - entry.registered_at).num_seconds();
            debug!(
                target: "whip.registry",
                resource_id = %resource_id,
                session_seconds,
                "session removed from registry"
            );
            true
        } else {
            false
        }
    }

    /// True when no sessions are registered; used for drain readiness.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.locked().is_empty()
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.locked().len()
    }
}
