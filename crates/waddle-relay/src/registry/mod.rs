//! Session lookup consumed by the router.
//!
//! The relay never owns sessions. It asks a [`SessionRegistry`] which sessions
//! exist for an address, reads their state and priority at resolution time,
//! and hands stanzas to them through [`SessionContext::accept`].
//!
//! [`ResourceRegistry`] is an in-process implementation backed by per-session
//! outbound channels:
//!
//! ```text
//! StanzaRouter --> ResourceRegistry --> LocalSession (user@domain/res) --> mpsc::Sender
//!                   DashMap<FullJid,
//!                    Arc<LocalSession>>
//! ```

mod resource_registry;

use std::fmt;
use std::sync::Arc;

use jid::{FullJid, Jid};

use crate::error::DeliveryError;
use crate::stanza::Stanza;
use crate::types::SessionState;

pub use resource_registry::{LocalSession, OutboundStanza, ResourceRegistry};

/// A live client session as seen by the relay.
pub trait SessionContext: Send + Sync + fmt::Debug {
    /// Full address the session is bound to.
    fn jid(&self) -> &FullJid;

    /// Current protocol state. May change at any time.
    fn state(&self) -> SessionState;

    /// Last advertised presence priority (higher is preferred).
    fn priority(&self) -> i8;

    /// In-process handler accepting a stanza for this session.
    fn accept(&self, stanza: Stanza) -> Result<(), DeliveryError>;
}

/// Lookup of sessions by address.
///
/// Returned sessions are ordered by descending priority, ties broken by
/// address, so repeated lookups over an unchanged set agree.
pub trait SessionRegistry: Send + Sync {
    /// All sessions for an address.
    ///
    /// A bare address yields every resource of the account; a full address
    /// yields at most the one bound session.
    fn sessions_for(&self, jid: &Jid) -> Vec<Arc<dyn SessionContext>>;

    /// Sessions sharing the highest priority among those at or above `threshold`.
    ///
    /// Empty if no session meets the threshold.
    ///
    /// Each priority is read once, so a concurrent priority change cannot
    /// leave the result empty while an eligible session exists.
    fn highest_priority_sessions(&self, jid: &Jid, threshold: i8) -> Vec<Arc<dyn SessionContext>> {
        let candidates: Vec<(i8, Arc<dyn SessionContext>)> = self
            .sessions_for(jid)
            .into_iter()
            .map(|s| (s.priority(), s))
            .filter(|(priority, _)| *priority >= threshold)
            .collect();
        let Some(best) = candidates.iter().map(|(priority, _)| *priority).max() else {
            return Vec::new();
        };
        candidates
            .into_iter()
            .filter(|(priority, _)| *priority == best)
            .map(|(_, s)| s)
            .collect()
    }

    /// Sessions whose priority is at or above `threshold`.
    fn sessions_with_min_priority(&self, jid: &Jid, threshold: i8) -> Vec<Arc<dyn SessionContext>> {
        self.sessions_for(jid)
            .into_iter()
            .filter(|s| s.priority() >= threshold)
            .collect()
    }
}
