//! Failure strategies.
//!
//! A strategy runs after a relay attempt recorded processing errors and
//! decides what happens next: nothing, an error reply to the sender, or
//! persisting the stanza for later delivery. Strategies compose through
//! [`FailureStrategyChain`].

mod bounce;
mod chain;
mod ignore;
mod offline;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::stanza::Stanza;

pub use bounce::ReturnErrorToSenderStrategy;
pub use chain::FailureStrategyChain;
pub use ignore::IgnoreFailureStrategy;
pub use offline::StoreOfflineStrategy;

/// Policy invoked with a stanza and the errors its delivery produced.
///
/// Returning an error marks the whole relay attempt as failed.
#[async_trait]
pub trait DeliveryFailureStrategy: Send + Sync {
    async fn process(&self, stanza: &Stanza, errors: &[DeliveryError]) -> Result<(), DeliveryError>;
}
