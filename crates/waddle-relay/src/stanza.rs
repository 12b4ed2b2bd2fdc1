//! The stanza unit handed to the relay.

use jid::Jid;
use xmpp_parsers::iq::{Iq, IqType};
use xmpp_parsers::message::{Message, MessageType};
use xmpp_parsers::presence::{Presence, Type as PresenceType};

use crate::types::StanzaType;

/// A routable XMPP stanza.
#[derive(Debug, Clone)]
pub enum Stanza {
    Message(Message),
    Presence(Presence),
    Iq(Iq),
}

impl Stanza {
    /// Get the stanza type name for tracing.
    pub fn name(&self) -> &'static str {
        self.stanza_type().as_str()
    }

    /// Get the top-level stanza type.
    pub fn stanza_type(&self) -> StanzaType {
        match self {
            Stanza::Message(_) => StanzaType::Message,
            Stanza::Presence(_) => StanzaType::Presence,
            Stanza::Iq(_) => StanzaType::Iq,
        }
    }

    /// Destination address, if set.
    pub fn recipient(&self) -> Option<&Jid> {
        match self {
            Stanza::Message(m) => m.to.as_ref(),
            Stanza::Presence(p) => p.to.as_ref(),
            Stanza::Iq(iq) => iq.to.as_ref(),
        }
    }

    /// Source address, if set.
    pub fn sender(&self) -> Option<&Jid> {
        match self {
            Stanza::Message(m) => m.from.as_ref(),
            Stanza::Presence(p) => p.from.as_ref(),
            Stanza::Iq(iq) => iq.from.as_ref(),
        }
    }

    /// Stanza id, if set.
    pub fn id(&self) -> Option<&str> {
        match self {
            Stanza::Message(m) => m.id.as_deref(),
            Stanza::Presence(p) => p.id.as_deref(),
            Stanza::Iq(iq) => Some(iq.id.as_str()),
        }
    }

    /// Message sub-type, for message stanzas only.
    pub fn message_type(&self) -> Option<&MessageType> {
        match self {
            Stanza::Message(m) => Some(&m.type_),
            _ => None,
        }
    }

    /// Whether this stanza is itself an error or a response.
    ///
    /// Such stanzas must never trigger an error reply.
    pub fn is_error_or_response(&self) -> bool {
        match self {
            Stanza::Message(m) => m.type_ == MessageType::Error,
            Stanza::Presence(p) => p.type_ == PresenceType::Error,
            Stanza::Iq(iq) => matches!(iq.payload, IqType::Result(_) | IqType::Error(_)),
        }
    }

    /// Whether delivery to a full address may fall back to the bare address
    /// when no session matches the resource.
    pub fn permits_bare_fallback(&self) -> bool {
        match self {
            Stanza::Message(m) => matches!(
                m.type_,
                MessageType::Chat | MessageType::Normal | MessageType::Headline
            ),
            Stanza::Presence(_) => true,
            Stanza::Iq(_) => false,
        }
    }
}

impl From<Message> for Stanza {
    fn from(message: Message) -> Self {
        Stanza::Message(message)
    }
}

impl From<Presence> for Stanza {
    fn from(presence: Presence) -> Self {
        Stanza::Presence(presence)
    }
}

impl From<Iq> for Stanza {
    fn from(iq: Iq) -> Self {
        Stanza::Iq(iq)
    }
}
