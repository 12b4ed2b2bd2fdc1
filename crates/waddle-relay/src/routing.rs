//! Stanza routing for inbound delivery.
//!
//! The `StanzaRouter` resolves a destination address to the session(s) that
//! should receive a stanza and hands it to them. It does no scheduling of its
//! own; the relay engine runs it on a worker.
//!
//! # Routing Logic
//!
//! For each stanza, the router:
//! 1. Sends stanzas for other domains to the matching server component
//! 2. Rejects groupchat messages to local accounts
//! 3. For a full JID: the session bound to that resource, falling back to the
//!    bare JID where the stanza type allows it (never for errors or IQs)
//! 4. For a bare JID: all or the highest-priority sessions, by stanza type;
//!    error messages are dropped
//! 5. With no eligible session: offline handling via account verification
//!    and the offline receiver
//!
//! # Example
//!
//! ```ignore
//! use waddle_relay::routing::{RouterConfig, StanzaRouter};
//!
//! let router = StanzaRouter::new(
//!     RouterConfig::new("waddle.social".to_string()),
//!     resource_registry,
//!     accounts,
//! )
//! .with_offline_receiver(offline_store)
//! .with_components(component_registry);
//!
//! let result = router.resolve(&to, &stanza).await;
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use jid::Jid;
use tracing::{debug, info, instrument, warn};
use xmpp_parsers::message::MessageType;

use crate::components::ComponentResolver;
use crate::delivery::DeliveryResult;
use crate::error::DeliveryError;
use crate::registry::{SessionContext, SessionRegistry};
use crate::stanza::Stanza;
use crate::storage::{AccountVerification, OfflineStanzaReceiver};
use crate::types::SessionState;

/// Minimum priority for a session to receive stanzas addressed by priority.
pub const PRIORITY_THRESHOLD: i8 = 0;

const NON_AUTHENTICATED: &str = "no relay to non-authenticated session";

/// Configuration for the stanza router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// The local domain for this server
    pub local_domain: String,
    /// Deliver chat/normal messages for a bare JID only to the
    /// highest-priority resources instead of every non-negative one
    pub deliver_to_highest_priority_only: bool,
}

impl RouterConfig {
    /// Create a new router configuration.
    pub fn new(local_domain: String) -> Self {
        Self {
            local_domain,
            deliver_to_highest_priority_only: false,
        }
    }

    pub fn with_highest_priority_only(mut self, enabled: bool) -> Self {
        self.deliver_to_highest_priority_only = enabled;
        self
    }
}

/// Hands a stanza to one session.
///
/// Implementations hold no per-call state and may be invoked concurrently
/// from any number of workers.
#[async_trait]
pub trait StanzaDeliverer: Send + Sync {
    async fn deliver(&self, session: &dyn SessionContext, stanza: &Stanza) -> Result<(), DeliveryError>;
}

/// Default deliverer: re-checks the session state at invocation time, then
/// calls the session's handler.
///
/// A session can leave the authenticated state between lookup and delivery;
/// that is reported as a processing error.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionHandoff;

#[async_trait]
impl StanzaDeliverer for SessionHandoff {
    async fn deliver(&self, session: &dyn SessionContext, stanza: &Stanza) -> Result<(), DeliveryError> {
        if session.state() != SessionState::Authenticated {
            return Err(DeliveryError::failed(NON_AUTHENTICATED));
        }
        session.accept(stanza.clone())
    }
}

/// Which sessions of a bare JID receive a stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    All,
    NonNegativePriority,
    HighestPriority,
}

/// Resolves destinations to sessions and delivers to them.
pub struct StanzaRouter {
    config: RouterConfig,
    sessions: Arc<dyn SessionRegistry>,
    accounts: Arc<dyn AccountVerification>,
    offline_receiver: Option<Arc<dyn OfflineStanzaReceiver>>,
    components: Option<Arc<dyn ComponentResolver>>,
    deliverer: Arc<dyn StanzaDeliverer>,
}

impl StanzaRouter {
    /// Create a new stanza router.
    ///
    /// # Arguments
    ///
    /// * `config` - Router configuration including local domain
    /// * `sessions` - Registry of local sessions
    /// * `accounts` - Account verification used when no session is found
    pub fn new(
        config: RouterConfig,
        sessions: Arc<dyn SessionRegistry>,
        accounts: Arc<dyn AccountVerification>,
    ) -> Self {
        info!(
            local_domain = %config.local_domain,
            highest_priority_only = config.deliver_to_highest_priority_only,
            "StanzaRouter initialized"
        );

        Self {
            config,
            sessions,
            accounts,
            offline_receiver: None,
            components: None,
            deliverer: Arc::new(SessionHandoff),
        }
    }

    /// Store stanzas for offline accounts in this receiver.
    pub fn with_offline_receiver(mut self, receiver: Arc<dyn OfflineStanzaReceiver>) -> Self {
        self.offline_receiver = Some(receiver);
        self
    }

    /// Route stanzas for subdomains to these components.
    pub fn with_components(mut self, components: Arc<dyn ComponentResolver>) -> Self {
        self.components = Some(components);
        self
    }

    /// Replace the per-session delivery step.
    pub fn with_deliverer(mut self, deliverer: Arc<dyn StanzaDeliverer>) -> Self {
        self.deliverer = deliverer;
        self
    }

    /// Get the router configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn has_offline_receiver(&self) -> bool {
        self.offline_receiver.is_some()
    }

    /// Check if a JID addresses this server rather than a component.
    pub fn is_local_jid(&self, jid: &Jid) -> bool {
        jid.domain().as_str() == self.config.local_domain
    }

    /// Check if a domain is a subdomain of this server.
    pub fn is_component_domain(&self, domain: &str) -> bool {
        domain
            .strip_suffix(self.config.local_domain.as_str())
            .is_some_and(|prefix| prefix.len() > 1 && prefix.ends_with('.'))
    }

    /// Resolve a destination and deliver the stanza.
    ///
    /// Returns `None` when the stanza is silently dropped.
    #[instrument(skip(self, stanza), fields(to = %to, stanza = stanza.name()))]
    pub async fn resolve(&self, to: &Jid, stanza: &Stanza) -> Option<DeliveryResult> {
        if !self.is_local_jid(to) {
            return Some(self.deliver_to_component(to, stanza).await);
        }

        if stanza.message_type() == Some(&MessageType::Groupchat) {
            debug!("Groupchat message addressed to an account, not a room");
            return Some(DeliveryResult::failed(DeliveryError::service_not_available(
                "groupchat messages are handled by the groupchat service",
            )));
        }

        if to.resource().is_some() {
            Some(self.deliver_to_full_jid(to, stanza).await)
        } else {
            self.deliver_to_bare_jid(to, stanza).await
        }
    }

    async fn deliver_to_component(&self, to: &Jid, stanza: &Stanza) -> DeliveryResult {
        let domain = to.domain().as_str();
        debug!(domain = %domain, "Destination addresses a component");

        if !self.is_component_domain(domain) {
            return DeliveryResult::failed(DeliveryError::service_not_available(format!(
                "unsupported domain {}",
                domain
            )));
        }

        let Some(components) = self.components.as_ref() else {
            return DeliveryResult::failed(DeliveryError::service_not_available(
                "no component resolver configured",
            ));
        };

        let Some(processor) = components.processor_for(domain) else {
            return DeliveryResult::failed(DeliveryError::service_not_available(format!(
                "no component processor for {}",
                domain
            )));
        };

        match processor.process(stanza.clone()).await {
            Ok(()) => DeliveryResult::new().set_processed(),
            Err(e) => {
                warn!(domain = %domain, error = %e, "Component failed to process stanza");
                DeliveryResult::failed(e)
            }
        }
    }

    async fn deliver_to_full_jid(&self, to: &Jid, stanza: &Stanza) -> DeliveryResult {
        let mut sessions = self.sessions.highest_priority_sessions(to, PRIORITY_THRESHOLD);

        if sessions.is_empty() && stanza.permits_bare_fallback() {
            debug!("No session for resource, falling back to bare JID");
            let bare = Jid::from(to.to_bare());
            sessions = self.sessions.highest_priority_sessions(&bare, PRIORITY_THRESHOLD);
        }

        if sessions.is_empty() {
            return self.relay_not_possible(to, stanza).await;
        }
        self.deliver_to_sessions(&sessions, stanza).await
    }

    /// Error messages for a bare address have no session to answer and are
    /// dropped.
    async fn deliver_to_bare_jid(&self, to: &Jid, stanza: &Stanza) -> Option<DeliveryResult> {
        let selection = match stanza {
            Stanza::Presence(_) => Selection::All,
            Stanza::Iq(_) => Selection::HighestPriority,
            Stanza::Message(message) => match message.type_ {
                MessageType::Error => {
                    debug!("Silently dropping error message for bare address");
                    return None;
                }
                MessageType::Headline => Selection::All,
                _ if self.config.deliver_to_highest_priority_only => Selection::HighestPriority,
                _ => Selection::NonNegativePriority,
            },
        };

        let sessions = match selection {
            Selection::All => self.sessions.sessions_for(to),
            Selection::NonNegativePriority => {
                self.sessions.sessions_with_min_priority(to, PRIORITY_THRESHOLD)
            }
            Selection::HighestPriority => {
                self.sessions.highest_priority_sessions(to, PRIORITY_THRESHOLD)
            }
        };

        if sessions.is_empty() {
            return Some(self.relay_not_possible(to, stanza).await);
        }
        if sessions.len() > 1 {
            debug!(count = sessions.len(), ?selection, "Fanning out to multiple sessions");
        }
        Some(self.deliver_to_sessions(&sessions, stanza).await)
    }

    /// Offline handling once no eligible session exists.
    async fn relay_not_possible(&self, to: &Jid, stanza: &Stanza) -> DeliveryResult {
        let bare = to.to_bare();

        match self.accounts.exists(&bare).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(to = %to, stanza = stanza.name(), "Cannot relay to non-existing account");
                return DeliveryResult::failed(DeliveryError::NoSuchLocalUser);
            }
            Err(e) => {
                warn!(to = %to, error = %e, "Account verification failed");
                return DeliveryResult::failed(DeliveryError::wrap("account verification failed", e));
            }
        }

        let Some(receiver) = self.offline_receiver.as_ref() else {
            warn!(to = %to, stanza = stanza.name(), "Cannot relay to offline account");
            return DeliveryResult::failed(DeliveryError::LocalRecipientOffline);
        };

        debug!(to = %to, "Recipient offline, handing stanza to offline receiver");
        match receiver.receive(stanza.clone()).await {
            Ok(()) => DeliveryResult::failed(DeliveryError::DeliveredToOfflineReceiver),
            Err(e) => {
                warn!(to = %to, error = %e, "Offline receiver rejected stanza");
                DeliveryResult::failed(DeliveryError::wrap("offline receiver rejected stanza", e))
            }
        }
    }

    async fn deliver_to_sessions(
        &self,
        sessions: &[Arc<dyn SessionContext>],
        stanza: &Stanza,
    ) -> DeliveryResult {
        let outcomes = join_all(
            sessions
                .iter()
                .map(|session| self.deliver_to_session(session.as_ref(), stanza)),
        )
        .await;

        let mut result = DeliveryResult::new();
        for error in outcomes.into_iter().filter_map(Result::err) {
            result.add_processing_error(error);
        }
        result.set_processed()
    }

    async fn deliver_to_session(
        &self,
        session: &dyn SessionContext,
        stanza: &Stanza,
    ) -> Result<(), DeliveryError> {
        if session.state() != SessionState::Authenticated {
            warn!(session = %session.jid(), state = %session.state(), "Cannot relay to non-authenticated session");
            return Err(DeliveryError::failed(NON_AUTHENTICATED));
        }

        match AssertUnwindSafe(self.deliverer.deliver(session, stanza))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {
                debug!(session = %session.jid(), "Stanza delivered to session");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(session = %session.jid(), error = %e, "Session handler rejected stanza");
                Err(e)
            }
            Err(_) => {
                warn!(session = %session.jid(), "Session handler panicked");
                Err(DeliveryError::failed("session handler panicked"))
            }
        }
    }
}

impl std::fmt::Debug for StanzaRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StanzaRouter")
            .field("config", &self.config)
            .field("offline_receiver", &self.offline_receiver.is_some())
            .field("components", &self.components.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ComponentProcessor, ComponentRegistry};
    use crate::error::DeliveryErrorKind;
    use crate::registry::ResourceRegistry;
    use crate::storage::{InMemoryStanzaStore, StaticAccounts};
    use jid::{BareJid, FullJid};
    use minidom::Element;
    use tokio::sync::mpsc;
    use xmpp_parsers::iq::{Iq, IqType};
    use xmpp_parsers::message::Message;
    use xmpp_parsers::presence::{Presence, Type as PresenceType};

    const DOMAIN: &str = "waddle.social";

    struct Fixture {
        registry: Arc<ResourceRegistry>,
        store: Arc<InMemoryStanzaStore>,
        router: StanzaRouter,
    }

    fn fixture(accounts: &[&str]) -> Fixture {
        let registry = Arc::new(ResourceRegistry::new());
        let store = Arc::new(InMemoryStanzaStore::new());
        let accounts = Arc::new(StaticAccounts::new(
            accounts.iter().map(|a| a.parse::<BareJid>().unwrap()),
        ));
        let router = StanzaRouter::new(
            RouterConfig::new(DOMAIN.to_string()),
            registry.clone(),
            accounts,
        );
        Fixture {
            registry,
            store,
            router,
        }
    }

    fn jid(s: &str) -> Jid {
        Jid::new(s).unwrap()
    }

    fn bind(registry: &ResourceRegistry, full: &str, priority: i8) -> mpsc::Receiver<crate::registry::OutboundStanza> {
        let (tx, rx) = mpsc::channel(16);
        registry
            .register(full.parse::<FullJid>().unwrap(), tx)
            .set_priority(priority);
        rx
    }

    fn message(to: &str, type_: MessageType) -> Stanza {
        let mut msg = Message::new(Some(jid(to)));
        msg.type_ = type_;
        Stanza::Message(msg)
    }

    fn iq_get(to: &str) -> Stanza {
        Stanza::Iq(Iq {
            from: Some(jid("romeo@waddle.social/balcony")),
            to: Some(jid(to)),
            id: "q1".to_string(),
            payload: IqType::Get(Element::builder("ping", "urn:xmpp:ping").build()),
        })
    }

    fn presence(to: &str) -> Stanza {
        let mut pres = Presence::new(PresenceType::None);
        pres.to = Some(jid(to));
        Stanza::Presence(pres)
    }

    #[test]
    fn test_router_config() {
        let config = RouterConfig::new("example.com".to_string());
        assert_eq!(config.local_domain, "example.com");
        assert!(!config.deliver_to_highest_priority_only);

        let config = config.with_highest_priority_only(true);
        assert!(config.deliver_to_highest_priority_only);
    }

    #[test]
    fn test_component_domain_detection() {
        let f = fixture(&[]);
        assert!(f.router.is_component_domain("muc.waddle.social"));
        assert!(!f.router.is_component_domain("waddle.social"));
        assert!(!f.router.is_component_domain("evilwaddle.social"));
        assert!(!f.router.is_component_domain("example.com"));

        assert!(f.router.is_local_jid(&jid("user@waddle.social/res")));
        assert!(!f.router.is_local_jid(&jid("room@muc.waddle.social")));
    }

    #[tokio::test]
    async fn test_full_jid_delivery() {
        let f = fixture(&["alice@waddle.social"]);
        let mut rx = bind(&f.registry, "alice@waddle.social/phone", 5);

        let to = jid("alice@waddle.social/phone");
        let result = f
            .router
            .resolve(&to, &message("alice@waddle.social/phone", MessageType::Chat))
            .await
            .unwrap();

        assert!(result.is_processed());
        assert!(!result.has_processing_errors());
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_error_message_to_bare_dropped() {
        let f = fixture(&["alice@waddle.social"]);
        let mut rx = bind(&f.registry, "alice@waddle.social/phone", 5);

        let to = "alice@waddle.social";
        let result = f.router.resolve(&jid(to), &message(to, MessageType::Error)).await;
        assert!(result.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_error_message_to_full_delivered_without_fallback() {
        let f = fixture(&["alice@waddle.social"]);
        let mut phone = bind(&f.registry, "alice@waddle.social/phone", 5);

        let to = "alice@waddle.social/phone";
        let result = f
            .router
            .resolve(&jid(to), &message(to, MessageType::Error))
            .await
            .unwrap();
        assert!(result.is_processed());
        assert!(!result.has_processing_errors());
        assert!(phone.try_recv().is_ok());

        let to = "alice@waddle.social/laptop";
        let result = f
            .router
            .resolve(&jid(to), &message(to, MessageType::Error))
            .await
            .unwrap();
        assert!(!result.is_processed());
        assert_eq!(result.error_kinds(), vec![DeliveryErrorKind::LocalRecipientOffline]);
        assert!(phone.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_groupchat_rejected() {
        let f = fixture(&["alice@waddle.social"]);
        let _rx = bind(&f.registry, "alice@waddle.social/phone", 5);

        for to in ["alice@waddle.social", "alice@waddle.social/phone"] {
            let result = f
                .router
                .resolve(&jid(to), &message(to, MessageType::Groupchat))
                .await
                .unwrap();
            assert_eq!(result.error_kinds(), vec![DeliveryErrorKind::ServiceNotAvailable]);
            assert!(!result.is_processed());
        }
    }

    #[tokio::test]
    async fn test_chat_to_bare_skips_negative_priority() {
        let f = fixture(&["alice@waddle.social"]);
        let mut high = bind(&f.registry, "alice@waddle.social/a", 5);
        let mut low = bind(&f.registry, "alice@waddle.social/b", 1);
        let mut negative = bind(&f.registry, "alice@waddle.social/c", -1);

        let result = f
            .router
            .resolve(&jid("alice@waddle.social"), &message("alice@waddle.social", MessageType::Chat))
            .await
            .unwrap();

        assert!(!result.has_processing_errors());
        assert!(high.try_recv().is_ok());
        assert!(low.try_recv().is_ok());
        assert!(negative.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_chat_to_bare_highest_priority_only() {
        let registry = Arc::new(ResourceRegistry::new());
        let mut high = bind(&registry, "alice@waddle.social/a", 5);
        let mut low = bind(&registry, "alice@waddle.social/b", 1);
        let router = StanzaRouter::new(
            RouterConfig::new(DOMAIN.to_string()).with_highest_priority_only(true),
            registry,
            Arc::new(StaticAccounts::default()),
        );

        router
            .resolve(&jid("alice@waddle.social"), &message("alice@waddle.social", MessageType::Normal))
            .await
            .unwrap();

        assert!(high.try_recv().is_ok());
        assert!(low.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_headline_reaches_all_sessions() {
        let f = fixture(&["alice@waddle.social"]);
        let mut a = bind(&f.registry, "alice@waddle.social/a", 5);
        let mut b = bind(&f.registry, "alice@waddle.social/b", -3);

        f.router
            .resolve(
                &jid("alice@waddle.social"),
                &message("alice@waddle.social", MessageType::Headline),
            )
            .await
            .unwrap();

        assert!(a.try_recv().is_ok());
        assert!(b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_presence_to_full_falls_back_to_bare() {
        let f = fixture(&["alice@waddle.social"]);
        let mut rx = bind(&f.registry, "alice@waddle.social/laptop", 0);

        let result = f
            .router
            .resolve(&jid("alice@waddle.social/gone"), &presence("alice@waddle.social/gone"))
            .await
            .unwrap();

        assert!(result.is_processed());
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_iq_to_bare_uses_best_session() {
        let f = fixture(&["alice@waddle.social"]);
        let mut best = bind(&f.registry, "alice@waddle.social/a", 7);
        let mut other = bind(&f.registry, "alice@waddle.social/b", 2);

        let result = f
            .router
            .resolve(&jid("alice@waddle.social"), &iq_get("alice@waddle.social"))
            .await
            .unwrap();

        assert!(!result.has_processing_errors());
        assert!(best.try_recv().is_ok());
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_offline_without_receiver() {
        let f = fixture(&["carol@waddle.social"]);
        let result = f
            .router
            .resolve(&jid("carol@waddle.social"), &message("carol@waddle.social", MessageType::Chat))
            .await
            .unwrap();

        assert_eq!(result.error_kinds(), vec![DeliveryErrorKind::LocalRecipientOffline]);
    }

    #[tokio::test]
    async fn test_offline_with_receiver() {
        let f = fixture(&["carol@waddle.social"]);
        let router = f.router.with_offline_receiver(f.store.clone());

        let result = router
            .resolve(&jid("carol@waddle.social"), &message("carol@waddle.social", MessageType::Chat))
            .await
            .unwrap();

        assert_eq!(result.error_kinds(), vec![DeliveryErrorKind::DeliveredToOfflineReceiver]);
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn test_session_turning_unauthenticated() {
        let f = fixture(&["dave@waddle.social"]);
        let _rx = bind(&f.registry, "dave@waddle.social/a", 0);
        let session = f
            .registry
            .get(&"dave@waddle.social/a".parse::<FullJid>().unwrap())
            .unwrap();

        // Resolved while authenticated, delivered after the state changed.
        session.set_state(SessionState::Ended);
        let outcome = SessionHandoff
            .deliver(session.as_ref(), &presence("dave@waddle.social"))
            .await;

        assert!(matches!(outcome, Err(DeliveryError::Failed { .. })));
    }

    struct Recorder(mpsc::UnboundedSender<Stanza>);

    #[async_trait]
    impl ComponentProcessor for Recorder {
        async fn process(&self, stanza: Stanza) -> Result<(), DeliveryError> {
            self.0
                .send(stanza)
                .map_err(|_| DeliveryError::failed("recorder closed"))
        }
    }

    #[tokio::test]
    async fn test_component_routing() {
        let components = Arc::new(ComponentRegistry::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        components.register("muc.waddle.social", Arc::new(Recorder(tx)));

        let f = fixture(&[]);
        let router = f.router.with_components(components);

        let to = jid("room@muc.waddle.social");
        let result = router
            .resolve(&to, &message("room@muc.waddle.social", MessageType::Groupchat))
            .await
            .unwrap();
        assert!(result.is_processed());
        assert!(!result.has_processing_errors());
        assert!(rx.try_recv().is_ok());

        let missing = router
            .resolve(&jid("node@pubsub.waddle.social"), &iq_get("node@pubsub.waddle.social"))
            .await
            .unwrap();
        assert_eq!(missing.error_kinds(), vec![DeliveryErrorKind::ServiceNotAvailable]);

        let foreign = router
            .resolve(&jid("user@example.com"), &message("user@example.com", MessageType::Chat))
            .await
            .unwrap();
        assert_eq!(foreign.error_kinds(), vec![DeliveryErrorKind::ServiceNotAvailable]);
    }

    struct Panicking;

    #[async_trait]
    impl StanzaDeliverer for Panicking {
        async fn deliver(&self, session: &dyn SessionContext, _stanza: &Stanza) -> Result<(), DeliveryError> {
            if session.priority() > 0 {
                panic!("handler blew up");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let f = fixture(&["erin@waddle.social"]);
        let _a = bind(&f.registry, "erin@waddle.social/a", 1);
        let _b = bind(&f.registry, "erin@waddle.social/b", 0);
        let router = f.router.with_deliverer(Arc::new(Panicking));

        let result = router
            .resolve(&jid("erin@waddle.social"), &presence("erin@waddle.social"))
            .await
            .unwrap();

        assert!(result.is_processed());
        assert_eq!(result.error_kinds(), vec![DeliveryErrorKind::Failed]);
    }
}
