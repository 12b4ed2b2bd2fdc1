use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::DeliveryFailureStrategy;
use crate::error::{DeliveryError, DeliveryErrorKind};
use crate::stanza::Stanza;
use crate::storage::OfflineStanzaReceiver;

/// Persists messages for recipients that were offline.
///
/// Only message stanzas that failed with
/// [`DeliveryError::LocalRecipientOffline`] are stored; everything else
/// passes through untouched.
pub struct StoreOfflineStrategy {
    receiver: Arc<dyn OfflineStanzaReceiver>,
}

impl StoreOfflineStrategy {
    pub fn new(receiver: Arc<dyn OfflineStanzaReceiver>) -> Self {
        Self { receiver }
    }
}

#[async_trait]
impl DeliveryFailureStrategy for StoreOfflineStrategy {
    async fn process(&self, stanza: &Stanza, errors: &[DeliveryError]) -> Result<(), DeliveryError> {
        let offline = errors
            .iter()
            .any(|e| e.kind() == DeliveryErrorKind::LocalRecipientOffline);
        if !offline || !matches!(stanza, Stanza::Message(_)) {
            return Ok(());
        }

        match self.receiver.receive(stanza.clone()).await {
            Ok(()) => {
                debug!(id = ?stanza.id(), "Stored message for offline recipient");
                Ok(())
            }
            Err(e) => {
                warn!(id = ?stanza.id(), error = %e, "Failed to store message for offline recipient");
                Err(DeliveryError::wrap("offline storage failed", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStanzaStore;
    use xmpp_parsers::message::Message;
    use xmpp_parsers::presence::{Presence, Type as PresenceType};

    #[tokio::test]
    async fn test_stores_offline_messages_only() {
        let store = Arc::new(InMemoryStanzaStore::new());
        let strategy = StoreOfflineStrategy::new(store.clone());

        let message = Stanza::Message(Message::new(Some("carol@example.com".parse().unwrap())));
        strategy
            .process(&message, &[DeliveryError::LocalRecipientOffline])
            .await
            .unwrap();
        strategy
            .process(&message, &[DeliveryError::NoSuchLocalUser])
            .await
            .unwrap();

        let mut presence = Presence::new(PresenceType::None);
        presence.to = Some("carol@example.com".parse().unwrap());
        strategy
            .process(&Stanza::Presence(presence), &[DeliveryError::LocalRecipientOffline])
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_is_wrapped() {
        let strategy = StoreOfflineStrategy::new(Arc::new(InMemoryStanzaStore::with_limit(0)));
        let message = Stanza::Message(Message::new(Some("carol@example.com".parse().unwrap())));

        let err = strategy
            .process(&message, &[DeliveryError::LocalRecipientOffline])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), DeliveryErrorKind::Failed);
    }
}
