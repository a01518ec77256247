//! Session registry: the last inbound message seen for each token.
//!
//! Entries are overwritten, never merged, on every message bearing the same
//! token. Delivery order is whatever the transport gives us, so the stored
//! entry is simply the last one written (no sequence numbers).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use log::debug;
use tokio::sync::RwLock;

use crate::models::{InboundMessage, Token};
use crate::types::Result;

/// Default session lifetime after the last write (24 hours).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(86400);

/// Default maximum number of tracked sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Trait for storing session entries keyed by token.
///
/// Implementations must be safe to share between concurrent dispatches
/// without any locking by the caller. Backends that can fail report it as
/// [`OneCloudError::StorageFailed`](crate::types::OneCloudError::StorageFailed).
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a message as the session entry for a token, replacing any
    /// previous entry.
    async fn put(&self, token: Token, message: InboundMessage) -> Result<()>;

    /// Retrieve the session entry for a token.
    async fn get(&self, token: Token) -> Result<Option<InboundMessage>>;

    /// Remove the session entry for a token.
    async fn remove(&self, token: Token) -> Result<Option<InboundMessage>>;

    /// Number of stored entries (including any not yet pruned).
    async fn len(&self) -> Result<usize>;

    /// Remove all expired entries.
    async fn prune_expired(&self) -> Result<()>;

    /// Remove all entries.
    async fn clear(&self) -> Result<()>;
}

/// Entry in the session store with its write time.
struct SessionEntry {
    message: InboundMessage,
    written_at: Instant,
}

/// In-memory session store with optional TTL and a capacity bound.
///
/// When a new token arrives at capacity, expired entries are pruned first;
/// if the store is still full, the entry written least recently is evicted.
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<Token, SessionEntry>>>,
    ttl: Option<Duration>,
    max_sessions: usize,
}

impl InMemorySessionStore {
    /// Creates a store with the given TTL (`None` = never expire) and capacity.
    pub fn new(ttl: Option<Duration>, max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Creates a store that never expires or evicts entries.
    pub fn unbounded() -> Self {
        Self::new(None, usize::MAX)
    }

    /// Creates a store with the default TTL (24 hours) and capacity.
    pub fn with_defaults() -> Self {
        Self::new(Some(DEFAULT_SESSION_TTL), DEFAULT_MAX_SESSIONS)
    }

    fn is_live(&self, entry: &SessionEntry, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(entry.written_at) < ttl,
            None => true,
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, token: Token, message: InboundMessage) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        if !sessions.contains_key(&token) && sessions.len() >= self.max_sessions {
            sessions.retain(|_, entry| self.is_live(entry, now));

            if sessions.len() >= self.max_sessions {
                let oldest = sessions
                    .iter()
                    .min_by_key(|(_, entry)| entry.written_at)
                    .map(|(token, _)| *token);
                if let Some(oldest) = oldest {
                    debug!("Session store full, evicting token {}", oldest);
                    sessions.remove(&oldest);
                }
            }
        }

        sessions.insert(
            token,
            SessionEntry {
                message,
                written_at: now,
            },
        );
        Ok(())
    }

    async fn get(&self, token: Token) -> Result<Option<InboundMessage>> {
        let sessions = self.sessions.read().await;
        let now = Instant::now();
        Ok(sessions
            .get(&token)
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| entry.message.clone()))
    }

    async fn remove(&self, token: Token) -> Result<Option<InboundMessage>> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(&token).map(|entry| entry.message))
    }

    async fn len(&self) -> Result<usize> {
        let sessions = self.sessions.read().await;
        Ok(sessions.len())
    }

    async fn prune_expired(&self) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        sessions.retain(|_, entry| self.is_live(entry, now));
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.clear();
        Ok(())
    }
}
