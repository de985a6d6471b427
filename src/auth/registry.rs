//! Live auth sessions, one per browser
//!
//! Keyed by the `client_id` cookie. A session is created on the first
//! attempt from a browser and torn down on logout, so two submissions from
//! the same browser share one in-flight flag.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::session::AuthSession;
use crate::identity::IdentityProvider;

const DEFAULT_MAX_SESSIONS: usize = 10_000;

struct Entry {
    session: Arc<AuthSession>,
    last_used: Instant,
}

impl Entry {
    fn is_idle(&self, idle_timeout: Duration) -> bool {
        !self.session.is_busy() && self.last_used.elapsed() >= idle_timeout
    }
}

/// Owner of every [`AuthSession`]
pub struct SessionRegistry {
    provider: Arc<dyn IdentityProvider>,
    entries: RwLock<HashMap<String, Entry>>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl SessionRegistry {
    /// Create a registry whose sessions talk to `provider`
    ///
    /// Sessions untouched for `idle_timeout` are dropped once the registry
    /// reaches its capacity.
    pub fn new(provider: Arc<dyn IdentityProvider>, idle_timeout: Duration) -> Self {
        Self::with_capacity(provider, idle_timeout, DEFAULT_MAX_SESSIONS)
    }

    pub fn with_capacity(
        provider: Arc<dyn IdentityProvider>,
        idle_timeout: Duration,
        max_sessions: usize,
    ) -> Self {
        Self {
            provider,
            entries: RwLock::new(HashMap::new()),
            idle_timeout,
            max_sessions: max_sessions.max(1),
        }
    }

    fn prune_idle_locked(entries: &mut HashMap<String, Entry>, idle_timeout: Duration) {
        entries.retain(|_, entry| !entry.is_idle(idle_timeout));
    }

    fn evict_oldest_locked(entries: &mut HashMap<String, Entry>) -> bool {
        let Some(oldest) = entries
            .iter()
            .filter(|(_, entry)| !entry.session.is_busy())
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(client, _)| client.clone())
        else {
            return false;
        };
        entries.remove(&oldest);
        true
    }

    /// The session for `client`, created on first use
    pub async fn session(&self, client: &str) -> Arc<AuthSession> {
        let mut entries = self.entries.write().await;

        if !entries.contains_key(client) && entries.len() >= self.max_sessions {
            Self::prune_idle_locked(&mut entries, self.idle_timeout);
            if entries.len() >= self.max_sessions && Self::evict_oldest_locked(&mut entries) {
                tracing::debug!("Session registry full; evicted least recently used session");
            }
        }

        let entry = entries.entry(client.to_string()).or_insert_with(|| Entry {
            session: Arc::new(AuthSession::new(Arc::clone(&self.provider))),
            last_used: Instant::now(),
        });
        entry.last_used = Instant::now();
        Arc::clone(&entry.session)
    }

    /// The session for `client`, if one exists
    pub async fn get(&self, client: &str) -> Option<Arc<AuthSession>> {
        let entries = self.entries.read().await;
        entries.get(client).map(|entry| Arc::clone(&entry.session))
    }

    /// Sign the client out and forget its session
    pub async fn end(&self, client: &str) {
        let removed = self.entries.write().await.remove(client);
        if let Some(entry) = removed {
            entry.session.sign_out().await;
        }
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
