use async_trait::async_trait;
use tracing::debug;

use super::DeliveryFailureStrategy;
use crate::error::DeliveryError;
use crate::stanza::Stanza;

/// Drops delivery failures.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreFailureStrategy;

#[async_trait]
impl DeliveryFailureStrategy for IgnoreFailureStrategy {
    async fn process(&self, stanza: &Stanza, errors: &[DeliveryError]) -> Result<(), DeliveryError> {
        debug!(
            stanza = stanza.name(),
            id = ?stanza.id(),
            errors = errors.len(),
            "Ignoring delivery failure"
        );
        Ok(())
    }
}
