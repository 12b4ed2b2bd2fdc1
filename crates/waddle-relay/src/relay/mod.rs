//! Asynchronous stanza relay.
//!
//! [`RelayEngine`] accepts relay requests without waiting for delivery,
//! runs each one on a bounded [`WorkerPool`], and hands delivery failures to
//! the strategy supplied with the request.

mod engine;
pub mod pool;

use std::sync::Arc;

use jid::Jid;
use tokio::sync::oneshot;

use crate::delivery::DeliveryResult;
use crate::error::DeliveryError;
use crate::failure::DeliveryFailureStrategy;
use crate::stanza::Stanza;

pub use engine::RelayEngine;
pub use pool::{Admission, PoolError, PoolSettings, PoolStats, Throughput, WorkerPool};

/// Entry point for relaying stanzas.
///
/// Failure strategies hold one of these to send replies through the same
/// engine that produced the failure.
pub trait StanzaRelay: Send + Sync {
    /// Schedule delivery of `stanza` to `to`. Returns without waiting for
    /// delivery; fails only when the relay is not accepting stanzas.
    fn relay(
        &self,
        to: Jid,
        stanza: Stanza,
        strategy: Arc<dyn DeliveryFailureStrategy>,
    ) -> Result<RelayHandle, DeliveryError>;

    /// Whether new stanzas are accepted.
    fn is_relaying(&self) -> bool;

    /// Stop accepting stanzas. Stanzas already accepted are still delivered.
    fn stop(&self);
}

/// Completion handle of one relay request.
///
/// Dropping the handle does not cancel the relay.
#[derive(Debug)]
pub struct RelayHandle {
    receiver: oneshot::Receiver<Option<DeliveryResult>>,
}

impl RelayHandle {
    pub(crate) fn new(receiver: oneshot::Receiver<Option<DeliveryResult>>) -> Self {
        Self { receiver }
    }

    /// A handle that is already complete.
    pub fn ready(result: Option<DeliveryResult>) -> Self {
        let (sender, receiver) = oneshot::channel();
        let _ = sender.send(result);
        Self { receiver }
    }

    /// Wait for the relay to finish.
    ///
    /// `None` when the stanza was silently dropped or the task never ran.
    pub async fn outcome(self) -> Option<DeliveryResult> {
        self.receiver.await.ok().flatten()
    }
}
