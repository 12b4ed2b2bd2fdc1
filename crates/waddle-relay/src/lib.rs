//! # waddle-relay
//!
//! Inbound stanza delivery for the Waddle Social XMPP server.
//!
//! Given a destination JID and a stanza, the relay decides which local
//! sessions receive it, delivers to all of them concurrently on a bounded
//! worker pool, collects per-session failures, and hands unsatisfied
//! deliveries to a pluggable failure strategy.
//!
//! ## Architecture
//!
//! - **Routing**: [`StanzaRouter`] resolves bare and full JIDs to sessions by
//!   stanza type and presence priority, with offline handling when no
//!   session is available
//! - **Relay Engine**: [`RelayEngine`] schedules relay tasks on a
//!   [`WorkerPool`] and never blocks the caller
//! - **Failure Strategies**: ignore, bounce an error to the sender, store
//!   offline, or a chain of these
//! - **Collaborators**: sessions, account lookup, offline and online storage
//!   are traits; in-process implementations are provided for embedding
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use waddle_relay::*;
//!
//! let config = RelayConfig::from_env()?;
//! config.log_config();
//!
//! let sessions = Arc::new(ResourceRegistry::new());
//! let store = Arc::new(InMemoryStanzaStore::new());
//! let router = StanzaRouter::new(config.router_config(), sessions.clone(), accounts)
//!     .with_offline_receiver(store.clone());
//!
//! let engine = Arc::new(
//!     RelayEngine::new(router, config.pool_settings())?.with_online_storage(store),
//! );
//! let bounce = Arc::new(ReturnErrorToSenderStrategy::new(engine.clone()));
//!
//! engine.relay(to, stanza, bounce)?;
//! ```

pub mod components;
pub mod config;
pub mod failure;
pub mod metrics;
pub mod registry;
pub mod relay;
pub mod routing;
pub mod storage;

mod delivery;
mod error;
mod stanza;
mod types;

pub use components::{ComponentProcessor, ComponentRegistry, ComponentResolver};
pub use config::RelayConfig;
pub use delivery::{DeliveryOutcome, DeliveryResult};
pub use error::{ConfigError, DeliveryError, DeliveryErrorKind};
pub use failure::{
    DeliveryFailureStrategy, FailureStrategyChain, IgnoreFailureStrategy,
    ReturnErrorToSenderStrategy, StoreOfflineStrategy,
};
pub use registry::{LocalSession, OutboundStanza, ResourceRegistry, SessionContext, SessionRegistry};
pub use relay::{
    Admission, PoolSettings, PoolStats, RelayEngine, RelayHandle, StanzaRelay, Throughput,
    WorkerPool,
};
pub use routing::{RouterConfig, SessionHandoff, StanzaDeliverer, StanzaRouter};
pub use stanza::Stanza;
pub use storage::{
    AccountVerification, InMemoryStanzaStore, OfflineStanzaReceiver, OnlineStorage, StaticAccounts,
    StanzaLog, StorageError,
};
pub use types::*;
