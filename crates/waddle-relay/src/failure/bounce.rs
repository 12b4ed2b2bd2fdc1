use std::sync::Arc;

use async_trait::async_trait;
use jid::Jid;
use tracing::{debug, instrument, warn};
use xmpp_parsers::iq::{Iq, IqType};
use xmpp_parsers::message::{Message, MessageType};
use xmpp_parsers::presence::{Presence, Type as PresenceType};
use xmpp_parsers::stanza_error::{DefinedCondition, ErrorType, StanzaError};

use super::{DeliveryFailureStrategy, IgnoreFailureStrategy};
use crate::error::DeliveryError;
use crate::relay::StanzaRelay;
use crate::stanza::Stanza;

/// Replies to the sender with a stanza error describing the first failure.
///
/// The reply is relayed with [`IgnoreFailureStrategy`], so an undeliverable
/// bounce is dropped rather than bounced again.
pub struct ReturnErrorToSenderStrategy {
    relay: Arc<dyn StanzaRelay>,
}

impl ReturnErrorToSenderStrategy {
    pub fn new(relay: Arc<dyn StanzaRelay>) -> Self {
        Self { relay }
    }
}

/// Map a delivery error to the stanza error sent back.
fn stanza_error_for(error: &DeliveryError) -> StanzaError {
    let (error_type, defined_condition) = match error {
        DeliveryError::NoSuchLocalUser | DeliveryError::ServiceNotAvailable(_) => {
            (ErrorType::Cancel, DefinedCondition::ServiceUnavailable)
        }
        DeliveryError::LocalRecipientOffline => (ErrorType::Wait, DefinedCondition::RecipientUnavailable),
        DeliveryError::DeliveredToOfflineReceiver | DeliveryError::Failed { .. } => {
            (ErrorType::Cancel, DefinedCondition::UndefinedCondition)
        }
    };
    StanzaError::new(error_type, defined_condition, "en", "")
}

/// Build the error reply for `stanza`, addressed to `sender`.
fn build_error_reply(stanza: &Stanza, sender: &Jid, stanza_error: StanzaError) -> Stanza {
    match stanza {
        Stanza::Message(original) => {
            let mut reply = Message::new(Some(sender.clone()));
            reply.from = original.to.clone();
            reply.id = original.id.clone();
            reply.type_ = MessageType::Error;
            reply.payloads.push(stanza_error.into());
            Stanza::Message(reply)
        }
        Stanza::Presence(original) => {
            let mut reply = Presence::new(PresenceType::Error);
            reply.to = Some(sender.clone());
            reply.from = original.to.clone();
            reply.id = original.id.clone();
            reply.payloads.push(stanza_error.into());
            Stanza::Presence(reply)
        }
        Stanza::Iq(original) => Stanza::Iq(Iq {
            from: original.to.clone(),
            to: Some(sender.clone()),
            id: original.id.clone(),
            payload: IqType::Error(stanza_error),
        }),
    }
}

#[async_trait]
impl DeliveryFailureStrategy for ReturnErrorToSenderStrategy {
    #[instrument(skip_all, fields(stanza = stanza.name(), id = ?stanza.id()))]
    async fn process(&self, stanza: &Stanza, errors: &[DeliveryError]) -> Result<(), DeliveryError> {
        if stanza.is_error_or_response() {
            debug!("Not bouncing an error or response stanza");
            return Ok(());
        }

        let Some(sender) = stanza.sender() else {
            debug!("Not bouncing a stanza without sender");
            return Ok(());
        };

        let Some(cause) = errors.iter().find(|e| !e.is_delivered_offline()) else {
            debug!("Stanza reached offline storage, nothing to bounce");
            return Ok(());
        };

        let reply = build_error_reply(stanza, sender, stanza_error_for(cause));
        debug!(to = %sender, cause = %cause.kind(), "Returning error to sender");

        self.relay
            .relay(sender.clone(), reply, Arc::new(IgnoreFailureStrategy))
            .map(|_handle| ())
            .map_err(|e| {
                warn!(to = %sender, error = %e, "Failed to relay error reply");
                e
            })
    }
}
