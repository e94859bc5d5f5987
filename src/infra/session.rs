//! In-memory browser sessions.
//!
//! Each session owns one [`SessionContext`] behind an async mutex. A request
//! holds the lock for its whole render, so requests of one session run one at
//! a time while different sessions proceed in parallel. Sessions idle for
//! longer than the configured TTL are dropped together with their cache.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use metrics::counter;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::application::render::SessionContext;

pub type SharedSession = Arc<Mutex<SessionContext>>;

/// Session attached to one request.
pub struct SessionHandle {
    pub id: Uuid,
    pub context: SharedSession,
    /// The session did not exist before this request; the client needs a cookie.
    pub created: bool,
}

struct SessionEntry {
    context: SharedSession,
    last_seen: Instant,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<Uuid, SessionEntry>>,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            idle_ttl,
        }
    }

    /// Existing session for `id`, or a fresh one when the id is missing, unknown or expired.
    ///
    /// Unknown ids are never adopted; the new session always gets a server-generated id.
    pub fn attach(&self, id: Option<Uuid>) -> SessionHandle {
        self.attach_at(id, Instant::now())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn attach_at(&self, id: Option<Uuid>, now: Instant) -> SessionHandle {
        if let Some(id) = id
            && let Some(context) = self.touch(id, now)
        {
            return SessionHandle {
                id,
                context,
                created: false,
            };
        }

        self.evict_idle(now);

        let id = Uuid::new_v4();
        let context: SharedSession = Arc::new(Mutex::new(SessionContext::new()));
        self.sessions.insert(
            id,
            SessionEntry {
                context: Arc::clone(&context),
                last_seen: now,
            },
        );
        counter!("mdpreview_sessions_created_total").increment(1);
        debug!(target = "mdpreview::session", session = %id, "session created");

        SessionHandle {
            id,
            context,
            created: true,
        }
    }

    fn touch(&self, id: Uuid, now: Instant) -> Option<SharedSession> {
        let mut entry = self.sessions.get_mut(&id)?;
        if self.is_idle(entry.last_seen, now) {
            return None;
        }
        entry.last_seen = now;
        Some(Arc::clone(&entry.context))
    }

    fn evict_idle(&self, now: Instant) {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| !self.is_idle(entry.last_seen, now));
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            counter!("mdpreview_sessions_expired_total").increment(evicted as u64);
            debug!(
                target = "mdpreview::session",
                evicted,
                remaining = self.sessions.len(),
                "idle sessions evicted"
            );
        }
    }

    fn is_idle(&self, last_seen: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_seen) >= self.idle_ttl
    }
}
