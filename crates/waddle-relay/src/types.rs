//! Common types for the relay.

use serde::{Deserialize, Serialize};

/// Protocol state of a client session as seen by the relay.
///
/// Only [`SessionState::Authenticated`] sessions are eligible for delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SessionState {
    /// Stream opened, nothing negotiated yet
    Initiated = 0,
    /// TLS established, SASL pending
    Encrypted = 1,
    /// SASL in progress
    Authenticating = 2,
    /// Authenticated and bound, ready for stanzas
    Authenticated = 3,
    /// Stream ended by either side
    Ended = 4,
    /// Transport closed
    Closed = 5,
}

impl SessionState {
    /// Decode a state previously stored with `as u8`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Initiated,
            1 => SessionState::Encrypted,
            2 => SessionState::Authenticating,
            3 => SessionState::Authenticated,
            4 => SessionState::Ended,
            _ => SessionState::Closed,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Initiated => write!(f, "initiated"),
            SessionState::Encrypted => write!(f, "encrypted"),
            SessionState::Authenticating => write!(f, "authenticating"),
            SessionState::Authenticated => write!(f, "authenticated"),
            SessionState::Ended => write!(f, "ended"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Stanza type for metrics and tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StanzaType {
    /// Message stanza
    Message,
    /// Presence stanza
    Presence,
    /// IQ (info/query) stanza
    Iq,
}

impl StanzaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StanzaType::Message => "message",
            StanzaType::Presence => "presence",
            StanzaType::Iq => "iq",
        }
    }
}

impl std::fmt::Display for StanzaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
