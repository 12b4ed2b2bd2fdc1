//! Shared fixtures for relay integration tests.
//!
//! Builds a small server world (accounts, bound sessions, stores) and
//! provides collaborator mocks that record what the relay did.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jid::{BareJid, FullJid, Jid};
use minidom::Element;
use tokio::sync::mpsc;
use waddle_relay::{
    DeliveryError, DeliveryFailureStrategy, InMemoryStanzaStore, OutboundStanza, PoolSettings,
    RelayEngine, ResourceRegistry, RouterConfig, SessionContext, Stanza, StanzaDeliverer, StanzaLog,
    StanzaRouter, StaticAccounts,
};
use xmpp_parsers::iq::{Iq, IqType};
use xmpp_parsers::message::{Message, MessageType};
use xmpp_parsers::presence::{Presence, Type as PresenceType};

pub const DOMAIN: &str = "waddle.social";

/// Default timeout for awaiting relay outcomes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

pub fn jid(s: &str) -> Jid {
    s.parse().expect("valid JID")
}

pub fn bare(s: &str) -> BareJid {
    s.parse().expect("valid bare JID")
}

pub fn full(s: &str) -> FullJid {
    s.parse().expect("valid full JID")
}

pub fn message(from: &str, to: &str, type_: MessageType) -> Stanza {
    let mut msg = Message::new(Some(jid(to)));
    msg.from = Some(jid(from));
    msg.id = Some("msg-1".to_string());
    msg.type_ = type_;
    Stanza::Message(msg)
}

pub fn chat(from: &str, to: &str) -> Stanza {
    message(from, to, MessageType::Chat)
}

pub fn presence(from: &str, to: &str) -> Stanza {
    let mut pres = Presence::new(PresenceType::None);
    pres.from = Some(jid(from));
    pres.to = Some(jid(to));
    Stanza::Presence(pres)
}

pub fn ping(from: &str, to: &str) -> Stanza {
    Stanza::Iq(Iq {
        from: Some(jid(from)),
        to: Some(jid(to)),
        id: "ping-1".to_string(),
        payload: IqType::Get(Element::builder("ping", "urn:xmpp:ping").build()),
    })
}

/// Accounts, sessions and stores of a test server.
pub struct TestWorld {
    pub registry: Arc<ResourceRegistry>,
    pub accounts: Arc<StaticAccounts>,
    pub store: Arc<InMemoryStanzaStore>,
}

impl TestWorld {
    /// A world where the given bare JIDs are existing accounts.
    pub fn with_accounts(accounts: &[&str]) -> Self {
        Self {
            registry: Arc::new(ResourceRegistry::new()),
            accounts: Arc::new(StaticAccounts::new(accounts.iter().map(|a| bare(a)))),
            store: Arc::new(InMemoryStanzaStore::new()),
        }
    }

    /// Bind a resource with the given priority.
    pub fn bind(&self, full_jid: &str, priority: i8) -> mpsc::Receiver<OutboundStanza> {
        let (tx, rx) = mpsc::channel(64);
        self.registry.register(full(full_jid), tx).set_priority(priority);
        rx
    }

    pub fn router(&self) -> StanzaRouter {
        StanzaRouter::new(
            RouterConfig::new(DOMAIN.to_string()),
            self.registry.clone(),
            self.accounts.clone(),
        )
    }

    pub fn router_with_offline(&self) -> StanzaRouter {
        self.router().with_offline_receiver(self.store.clone())
    }

    pub fn engine(&self, router: StanzaRouter) -> Arc<RelayEngine> {
        Arc::new(
            RelayEngine::new(router, PoolSettings::default().with_max_workers(2))
                .expect("engine on test runtime")
                .with_online_storage(self.store.clone()),
        )
    }
}

/// Drain everything currently queued on a session channel.
pub fn drain(rx: &mut mpsc::Receiver<OutboundStanza>) -> Vec<Stanza> {
    let mut out = Vec::new();
    while let Ok(outbound) = rx.try_recv() {
        out.push(outbound.stanza);
    }
    out
}

/// Strategy that records what it was invoked with.
#[derive(Default)]
pub struct RecordingStrategy {
    pub calls: Mutex<Vec<(Stanza, Vec<DeliveryError>)>>,
}

impl RecordingStrategy {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DeliveryFailureStrategy for RecordingStrategy {
    async fn process(&self, stanza: &Stanza, errors: &[DeliveryError]) -> Result<(), DeliveryError> {
        self.calls
            .lock()
            .unwrap()
            .push((stanza.clone(), errors.to_vec()));
        Ok(())
    }
}

/// Strategy that always fails.
pub struct FailingStrategy;

#[async_trait]
impl DeliveryFailureStrategy for FailingStrategy {
    async fn process(&self, _stanza: &Stanza, _errors: &[DeliveryError]) -> Result<(), DeliveryError> {
        Err(DeliveryError::failed("bounce storage unavailable"))
    }
}

/// Strategy that panics.
pub struct PanickingStrategy;

#[async_trait]
impl DeliveryFailureStrategy for PanickingStrategy {
    async fn process(&self, _stanza: &Stanza, _errors: &[DeliveryError]) -> Result<(), DeliveryError> {
        panic!("strategy bug");
    }
}

/// Stanza log that keeps every entry.
#[derive(Default)]
pub struct MemoryStanzaLog {
    pub entries: Mutex<Vec<(Jid, &'static str)>>,
}

impl StanzaLog for MemoryStanzaLog {
    fn log_stanza(&self, to: &Jid, stanza: &Stanza) {
        self.entries.lock().unwrap().push((to.clone(), stanza.name()));
    }
}

/// Deliverer that waits before handing off, counting completed deliveries.
pub struct SlowDeliverer {
    pub delay: Duration,
    pub delivered: AtomicUsize,
}

impl SlowDeliverer {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            delivered: AtomicUsize::new(0),
        })
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StanzaDeliverer for SlowDeliverer {
    async fn deliver(&self, session: &dyn SessionContext, stanza: &Stanza) -> Result<(), DeliveryError> {
        tokio::time::sleep(self.delay).await;
        session.accept(stanza.clone())?;
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
