//! Server components addressed by subdomain.
//!
//! Stanzas to a domain other than the server's own go to a component (for
//! example `muc.example.com`) instead of a user session.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::error::DeliveryError;
use crate::stanza::Stanza;

/// A component that processes stanzas addressed to its domain.
#[async_trait]
pub trait ComponentProcessor: Send + Sync {
    async fn process(&self, stanza: Stanza) -> Result<(), DeliveryError>;
}

/// Lookup of component processors by domain.
pub trait ComponentResolver: Send + Sync {
    fn processor_for(&self, domain: &str) -> Option<Arc<dyn ComponentProcessor>>;
}

/// Component resolver backed by a concurrent map.
#[derive(Default)]
pub struct ComponentRegistry {
    processors: DashMap<String, Arc<dyn ComponentProcessor>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor for a domain, replacing any previous one.
    pub fn register(&self, domain: impl Into<String>, processor: Arc<dyn ComponentProcessor>) {
        let domain = domain.into();
        info!(domain = %domain, "Registered component");
        self.processors.insert(domain, processor);
    }

    pub fn unregister(&self, domain: &str) -> bool {
        let removed = self.processors.remove(domain).is_some();
        if removed {
            debug!(domain = %domain, "Unregistered component");
        }
        removed
    }

    pub fn domains(&self) -> Vec<String> {
        self.processors.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl ComponentResolver for ComponentRegistry {
    fn processor_for(&self, domain: &str) -> Option<Arc<dyn ComponentProcessor>> {
        self.processors.get(domain).map(|entry| Arc::clone(entry.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sink;

    #[async_trait]
    impl ComponentProcessor for Sink {
        async fn process(&self, _stanza: Stanza) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = ComponentRegistry::new();
        registry.register("muc.example.com", Arc::new(Sink));

        assert!(registry.processor_for("muc.example.com").is_some());
        assert!(registry.processor_for("pubsub.example.com").is_none());
        assert_eq!(registry.domains(), vec!["muc.example.com".to_string()]);

        assert!(registry.unregister("muc.example.com"));
        assert!(!registry.unregister("muc.example.com"));
        assert!(registry.processor_for("muc.example.com").is_none());
    }
}
