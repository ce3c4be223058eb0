//! Process-wide session registry.
//!
//! Maps an externally supplied integer id to exactly one owning
//! session. The registry is an explicitly constructed service object:
//! the host creates it, threads it where needed, and drops it at
//! teardown. It performs no internal locking; callers invoking it from
//! several threads must supply their own synchronization.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::path::normalize_path;
use super::task::{AsyncDispatcher, RayonDispatcher};
use super::{Session, SessionId};

/// Owning map from session id to session.
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    dispatcher: Arc<dyn AsyncDispatcher>,
}

impl SessionRegistry {
    /// Registry whose sessions dispatch async batches to the rayon
    /// global pool.
    pub fn new() -> Self {
        Self::with_dispatcher(Arc::new(RayonDispatcher))
    }

    /// Registry with a host-supplied dispatcher.
    pub fn with_dispatcher(dispatcher: Arc<dyn AsyncDispatcher>) -> Self {
        Self {
            sessions: HashMap::new(),
            dispatcher,
        }
    }

    /// The session for `id`, creating an empty one on first use.
    /// At most one session exists per id at any time.
    pub fn get_or_create(&mut self, id: SessionId) -> &mut Session {
        match self.sessions.entry(id) {
            Entry::Occupied(entry) => {
                debug!(id, "using already created session");
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                debug!(id, "registering session");
                entry.insert(Session::new(id, Arc::clone(&self.dispatcher)))
            }
        }
    }

    /// The session for `id`, if one is registered.
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Remove and destroy the session for `id`; no-op when absent.
    /// Destruction joins the session's in-flight tasks and releases
    /// its archive state.
    pub fn destroy(&mut self, id: SessionId) {
        if self.sessions.remove(&id).is_some() {
            debug!(id, "unregistered session");
        }
    }

    /// Remove and destroy every session whose canonical loaded path
    /// equals `normalize_path(path)`; others are untouched. Used when
    /// an asset is deleted or about to be reloaded from scratch.
    pub fn destroy_all_with_path(&mut self, path: &str) {
        let path = normalize_path(path);
        self.sessions.retain(|id, session| {
            if session.path() == path {
                debug!(id = *id, path = %path, "unregistered session for removed asset");
                false
            } else {
                true
            }
        });
    }

    /// Number of registered sessions.
    #[inline]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        // A live entry at teardown is a caller lifecycle issue, not a
        // registry fault. Log and move on; Session::drop does the rest.
        if !self.sessions.is_empty() {
            warn!(
                remaining = self.sessions.len(),
                "sessions still registered at teardown"
            );
        }
    }
}
