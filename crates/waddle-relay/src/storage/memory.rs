//! Process-local storage implementations.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use dashmap::DashMap;
use jid::BareJid;
use tracing::{debug, instrument};

use super::{AccountVerification, OfflineStanzaReceiver, OnlineStorage, StorageError};
use crate::stanza::Stanza;

/// Default per-account stanza limit.
pub const DEFAULT_MAX_STANZAS_PER_ACCOUNT: usize = 1000;

/// A stanza held by [`InMemoryStanzaStore`].
#[derive(Debug, Clone)]
pub struct StoredStanza {
    pub stanza: Stanza,
    /// `false` for offline deliveries still pending, `true` for stanzas that
    /// were already relayed
    pub viewed: bool,
}

/// In-memory stanza store, keyed by the recipient's bare JID.
///
/// Serves both as offline receiver and as online storage.
#[derive(Debug)]
pub struct InMemoryStanzaStore {
    stanzas: DashMap<BareJid, Vec<StoredStanza>>,
    max_per_account: usize,
}

impl InMemoryStanzaStore {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_STANZAS_PER_ACCOUNT)
    }

    /// Create a store that holds at most `max_per_account` stanzas per recipient.
    pub fn with_limit(max_per_account: usize) -> Self {
        Self {
            stanzas: DashMap::new(),
            max_per_account,
        }
    }

    /// Stored stanzas for an account, oldest first.
    pub fn stanzas_for(&self, jid: &BareJid) -> Vec<StoredStanza> {
        self.stanzas
            .get(jid)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Remove and return pending offline stanzas for an account.
    pub fn drain_offline(&self, jid: &BareJid) -> Vec<Stanza> {
        let Some(mut entry) = self.stanzas.get_mut(jid) else {
            return Vec::new();
        };
        let (pending, kept): (Vec<_>, Vec<_>) = entry.drain(..).partition(|s| !s.viewed);
        *entry = kept;
        pending.into_iter().map(|s| s.stanza).collect()
    }

    pub fn len(&self) -> usize {
        self.stanzas.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, stanza: Stanza, viewed: bool) -> Result<(), StorageError> {
        let to = stanza.recipient().ok_or(StorageError::NoDestination)?.to_bare();
        let mut entry = self.stanzas.entry(to.clone()).or_default();
        if entry.len() >= self.max_per_account {
            return Err(StorageError::QuotaExceeded(to.to_string()));
        }
        entry.push(StoredStanza { stanza, viewed });
        debug!(to = %to, viewed, "Stored stanza");
        Ok(())
    }
}

impl Default for InMemoryStanzaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OfflineStanzaReceiver for InMemoryStanzaStore {
    #[instrument(skip(self, stanza), fields(stanza = stanza.name()))]
    async fn receive(&self, stanza: Stanza) -> Result<(), StorageError> {
        self.insert(stanza, false)
    }
}

#[async_trait]
impl OnlineStorage for InMemoryStanzaStore {
    async fn store_stanza(&self, stanza: &Stanza, already_viewed: bool) -> Result<(), StorageError> {
        self.insert(stanza.clone(), already_viewed)
    }
}

/// Fixed set of known accounts.
#[derive(Debug, Default)]
pub struct StaticAccounts {
    accounts: RwLock<HashSet<BareJid>>,
}

impl StaticAccounts {
    pub fn new<I>(accounts: I) -> Self
    where
        I: IntoIterator<Item = BareJid>,
    {
        Self {
            accounts: RwLock::new(accounts.into_iter().collect()),
        }
    }

    pub fn add(&self, jid: BareJid) {
        self.accounts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(jid);
    }
}

#[async_trait]
impl AccountVerification for StaticAccounts {
    async fn exists(&self, jid: &BareJid) -> Result<bool, StorageError> {
        self.accounts
            .read()
            .map(|accounts| accounts.contains(jid))
            .map_err(|e| StorageError::Database(e.to_string()))
    }
}
