use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::DeliveryFailureStrategy;
use crate::error::DeliveryError;
use crate::stanza::Stanza;

/// Runs strategies in order. The first error stops the chain.
#[derive(Default)]
pub struct FailureStrategyChain {
    strategies: Vec<Arc<dyn DeliveryFailureStrategy>>,
}

impl FailureStrategyChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy to the end of the chain.
    pub fn then(mut self, strategy: Arc<dyn DeliveryFailureStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[async_trait]
impl DeliveryFailureStrategy for FailureStrategyChain {
    async fn process(&self, stanza: &Stanza, errors: &[DeliveryError]) -> Result<(), DeliveryError> {
        for (index, strategy) in self.strategies.iter().enumerate() {
            if let Err(e) = strategy.process(stanza, errors).await {
                debug!(index, error = %e, "Failure strategy chain aborted");
                return Err(e);
            }
        }
        Ok(())
    }
}
