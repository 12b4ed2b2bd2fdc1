//! Storage collaborators consumed by the relay.
//!
//! - [`AccountVerification`]: does an address belong to an existing account
//! - [`OfflineStanzaReceiver`]: takes stanzas for accounts without a session
//! - [`OnlineStorage`]: records stanzas that were relayed with issues
//! - [`StanzaLog`]: audit hook called for every accepted relay
//!
//! [`InMemoryStanzaStore`] and [`StaticAccounts`] are process-local
//! implementations for embedding and tests.

mod memory;

use async_trait::async_trait;
use jid::{BareJid, Jid};
use thiserror::Error;

use crate::stanza::Stanza;

pub use memory::{InMemoryStanzaStore, StaticAccounts, StoredStanza};

/// Errors raised by storage collaborators.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage quota exceeded for {0}")]
    QuotaExceeded(String),

    #[error("Stanza has no usable destination")]
    NoDestination,
}

/// Account existence lookup.
#[async_trait]
pub trait AccountVerification: Send + Sync {
    /// Whether an account exists for the bare address.
    async fn exists(&self, jid: &BareJid) -> Result<bool, StorageError>;
}

/// Receiver for stanzas addressed to accounts with no available session.
///
/// Typically backed by an offline message store (XEP-0160).
#[async_trait]
pub trait OfflineStanzaReceiver: Send + Sync {
    async fn receive(&self, stanza: Stanza) -> Result<(), StorageError>;
}

/// Durable record of stanzas that went through the relay.
#[async_trait]
pub trait OnlineStorage: Send + Sync {
    /// Persist a stanza. `already_viewed` marks stanzas that reached at least
    /// the routing layer and must not be replayed as offline messages.
    async fn store_stanza(&self, stanza: &Stanza, already_viewed: bool) -> Result<(), StorageError>;
}

/// Audit log of relayed stanzas.
///
/// Called for every relay the engine accepts, including tasks the saturated
/// pool drops afterwards. Called synchronously on the submitting task, so
/// implementations must not block.
pub trait StanzaLog: Send + Sync {
    fn log_stanza(&self, to: &Jid, stanza: &Stanza);
}
