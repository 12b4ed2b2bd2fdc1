//! In-process resource registry.
//!
//! Tracks bound sessions by full JID. Each session owns an outbound channel
//! drained by its connection task; delivery is a non-blocking `try_send`.

use std::fmt;
use std::sync::atomic::{AtomicI8, AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use jid::{BareJid, FullJid, Jid};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::{SessionContext, SessionRegistry};
use crate::error::DeliveryError;
use crate::stanza::Stanza;
use crate::types::SessionState;

/// A stanza queued for a connection's writer.
#[derive(Debug, Clone)]
pub struct OutboundStanza {
    /// The stanza to send
    pub stanza: Stanza,
}

impl OutboundStanza {
    /// Create a new outbound stanza.
    pub fn new(stanza: Stanza) -> Self {
        Self { stanza }
    }
}

/// A session bound to a local connection.
///
/// State and priority are atomics so the connection task can update them
/// while the relay reads them concurrently.
pub struct LocalSession {
    jid: FullJid,
    sender: mpsc::Sender<OutboundStanza>,
    state: AtomicU8,
    priority: AtomicI8,
}

impl LocalSession {
    /// Create a new authenticated session with priority 0.
    pub fn new(jid: FullJid, sender: mpsc::Sender<OutboundStanza>) -> Self {
        Self {
            jid,
            sender,
            state: AtomicU8::new(SessionState::Authenticated as u8),
            priority: AtomicI8::new(0),
        }
    }

    pub fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn set_priority(&self, priority: i8) {
        self.priority.store(priority, Ordering::Release);
    }

    /// Whether the connection side has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl SessionContext for LocalSession {
    fn jid(&self) -> &FullJid {
        &self.jid
    }

    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn priority(&self) -> i8 {
        self.priority.load(Ordering::Acquire)
    }

    fn accept(&self, stanza: Stanza) -> Result<(), DeliveryError> {
        match self.sender.try_send(OutboundStanza::new(stanza)) {
            Ok(()) => {
                debug!(to = %self.jid, "Stanza queued for delivery");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(to = %self.jid, "Outbound channel full, applying backpressure");
                Err(DeliveryError::failed(format!("outbound channel full for {}", self.jid)))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(to = %self.jid, "Outbound channel closed, connection may have dropped");
                Err(DeliveryError::failed(format!("outbound channel closed for {}", self.jid)))
            }
        }
    }
}

impl fmt::Debug for LocalSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSession")
            .field("jid", &self.jid)
            .field("state", &self.state())
            .field("priority", &self.priority())
            .finish()
    }
}

/// Registry of bound local sessions.
///
/// ```ignore
/// let registry = ResourceRegistry::new();
///
/// // When a resource is bound:
/// let (tx, rx) = mpsc::channel(256);
/// let session = registry.register(full_jid.clone(), tx);
///
/// // When the client sends presence:
/// session.set_priority(5);
///
/// // When the connection closes:
/// registry.unregister(&full_jid);
/// ```
pub struct ResourceRegistry {
    sessions: DashMap<FullJid, Arc<LocalSession>>,
}

impl ResourceRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        info!("Creating resource registry");
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Register a session for a bound resource.
    ///
    /// If a session with the same JID already exists, it is replaced. This
    /// covers clients that reconnect with the same resource before the old
    /// connection is cleaned up.
    #[instrument(skip(self, sender), fields(jid = %jid))]
    pub fn register(&self, jid: FullJid, sender: mpsc::Sender<OutboundStanza>) -> Arc<LocalSession> {
        let session = Arc::new(LocalSession::new(jid.clone(), sender));
        if self.sessions.insert(jid, Arc::clone(&session)).is_some() {
            debug!("Replaced existing session registration");
        } else {
            debug!("Registered new session");
        }
        session
    }

    /// Unregister a session, returning it if it was registered.
    #[instrument(skip(self), fields(jid = %jid))]
    pub fn unregister(&self, jid: &FullJid) -> Option<Arc<LocalSession>> {
        let removed = self.sessions.remove(jid).map(|(_, session)| session);
        if removed.is_none() {
            debug!("Session was not registered");
        }
        removed
    }

    /// Look up the session bound to a full JID.
    pub fn get(&self, jid: &FullJid) -> Option<Arc<LocalSession>> {
        self.sessions.get(jid).map(|entry| Arc::clone(entry.value()))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Remove sessions whose connection dropped without unregistering.
    pub fn cleanup_stale(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_closed());
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            info!(count = removed, "Cleaned up stale sessions");
        }
        removed
    }

    fn sessions_of(&self, bare_jid: &BareJid) -> Vec<Arc<LocalSession>> {
        self.sessions
            .iter()
            .filter(|entry| entry.key().to_bare() == *bare_jid)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl SessionRegistry for ResourceRegistry {
    fn sessions_for(&self, jid: &Jid) -> Vec<Arc<dyn SessionContext>> {
        let mut found: Vec<Arc<LocalSession>> = match jid.clone().try_into_full() {
            Ok(full) => self.get(&full).into_iter().collect(),
            Err(bare) => self.sessions_of(&bare),
        };
        found.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.jid.to_string().cmp(&b.jid.to_string()))
        });
        found
            .into_iter()
            .map(|session| session as Arc<dyn SessionContext>)
            .collect()
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("session_count", &self.sessions.len())
            .finish()
    }
}
