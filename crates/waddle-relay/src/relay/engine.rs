use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use jid::Jid;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use super::pool::{Admission, PoolError, PoolSettings, PoolStats, Throughput, WorkerPool};
use super::{RelayHandle, StanzaRelay};
use crate::delivery::DeliveryResult;
use crate::error::{ConfigError, DeliveryError, DeliveryErrorKind};
use crate::failure::DeliveryFailureStrategy;
use crate::metrics;
use crate::routing::StanzaRouter;
use crate::stanza::Stanza;
use crate::storage::{OnlineStorage, StanzaLog};

/// Relay engine backed by a bounded worker pool.
///
/// ```ignore
/// let engine = Arc::new(
///     RelayEngine::new(router, PoolSettings::default())?
///         .with_online_storage(store),
/// );
/// let bounce = Arc::new(ReturnErrorToSenderStrategy::new(engine.clone()));
///
/// let handle = engine.relay(to, stanza, bounce)?;
/// ```
pub struct RelayEngine {
    router: Arc<StanzaRouter>,
    online_storage: Option<Arc<dyn OnlineStorage>>,
    stanza_log: Option<Arc<dyn StanzaLog>>,
    pool: WorkerPool,
    running: AtomicBool,
}

impl RelayEngine {
    /// Create an engine on the current Tokio runtime.
    pub fn new(router: StanzaRouter, settings: PoolSettings) -> Result<Self, ConfigError> {
        let pool = WorkerPool::new(settings)?;
        info!(local_domain = %router.config().local_domain, "Relay engine started");

        Ok(Self {
            router: Arc::new(router),
            online_storage: None,
            stanza_log: None,
            pool,
            running: AtomicBool::new(true),
        })
    }

    /// Persist stanzas whose delivery had errors.
    pub fn with_online_storage(mut self, storage: Arc<dyn OnlineStorage>) -> Self {
        self.online_storage = Some(storage);
        self
    }

    /// Record every accepted stanza.
    pub fn with_stanza_log(mut self, log: Arc<dyn StanzaLog>) -> Self {
        self.stanza_log = Some(log);
        self
    }

    pub fn router(&self) -> &StanzaRouter {
        &self.router
    }

    /// Wait until [`stop`](StanzaRelay::stop) was called and every accepted
    /// stanza has been processed.
    pub async fn stopped(&self) {
        self.pool.join().await;
        debug!("Relay engine stopped");
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Set `n` core workers and `2n` maximum workers.
    pub fn set_max_workers(&self, n: usize) -> Result<(), ConfigError> {
        self.pool.set_max_workers(n)
    }

    pub fn set_keep_alive(&self, keep_alive: Duration) {
        self.pool.set_keep_alive(keep_alive);
    }

    /// Completed relays since the previous call.
    pub fn throughput_snapshot(&self) -> Throughput {
        let throughput = self.pool.throughput_snapshot();
        debug!(
            completed = throughput.completed_tasks,
            interval_ms = throughput.interval.map(|i| i.as_millis() as u64),
            "Relay throughput"
        );
        throughput
    }
}

impl StanzaRelay for RelayEngine {
    fn relay(
        &self,
        to: Jid,
        stanza: Stanza,
        strategy: Arc<dyn DeliveryFailureStrategy>,
    ) -> Result<RelayHandle, DeliveryError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(DeliveryError::service_not_available("relay engine stopped"));
        }

        let stanza_type = stanza.name();
        let logged = self
            .stanza_log
            .as_ref()
            .map(|log| (Arc::clone(log), to.clone(), stanza.clone()));

        let (sender, receiver) = oneshot::channel();
        let task = RelayTask {
            router: Arc::clone(&self.router),
            online_storage: self.online_storage.clone(),
            to,
            stanza,
            strategy,
        };
        let submitted_at = Instant::now();
        let job = async move {
            let outcome = task.execute().await;
            metrics::record_relay_latency(
                submitted_at.elapsed().as_secs_f64() * 1000.0,
                stanza_type,
                outcome.as_ref().map(DeliveryResult::outcome),
            );
            let _ = sender.send(outcome);
        }
        .boxed();

        match self.pool.submit(job) {
            Ok(admission) => {
                if admission != Admission::Rejected {
                    metrics::record_relay_submitted(stanza_type);
                }
                // Rejection is invisible to the caller; the log still sees it.
                if let Some((log, to, stanza)) = logged {
                    log.log_stanza(&to, &stanza);
                }
            }
            Err(PoolError::Shutdown) => {
                return Err(DeliveryError::service_not_available("relay engine stopped"));
            }
        }

        Ok(RelayHandle::new(receiver))
    }

    fn is_relaying(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("Stopping relay engine");
        }
        self.pool.shutdown();
    }
}

impl std::fmt::Debug for RelayEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayEngine")
            .field("router", &self.router)
            .field("running", &self.is_relaying())
            .field("pool", &self.pool)
            .finish()
    }
}

/// One relay request as run on a worker.
struct RelayTask {
    router: Arc<StanzaRouter>,
    online_storage: Option<Arc<dyn OnlineStorage>>,
    to: Jid,
    stanza: Stanza,
    strategy: Arc<dyn DeliveryFailureStrategy>,
}

impl RelayTask {
    #[instrument(name = "relay.task", skip_all, fields(to = %self.to, stanza = self.stanza.name(), id = ?self.stanza.id()))]
    async fn execute(self) -> Option<DeliveryResult> {
        let result = self.router.resolve(&self.to, &self.stanza).await?;
        if !result.has_processing_errors() {
            debug!("Stanza relayed");
            return Some(result);
        }

        for error in result.processing_errors() {
            metrics::record_delivery_error(error.kind());
        }

        if !result.contains(DeliveryErrorKind::DeliveredToOfflineReceiver) {
            if let Some(storage) = self.online_storage.as_ref() {
                if let Err(e) = storage.store_stanza(&self.stanza, true).await {
                    warn!(error = %e, "Failed to persist stanza with delivery errors");
                }
            }
        }

        let errors = result.processing_errors();
        debug!(errors = errors.len(), kinds = ?result.error_kinds(), "Running failure strategy");
        match AssertUnwindSafe(self.strategy.process(&self.stanza, errors))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => Some(result),
            Ok(Err(e)) => {
                warn!(error = %e, "Failure strategy failed");
                Some(DeliveryResult::failed(DeliveryError::wrap("failure strategy failed", e)))
            }
            Err(_) => {
                warn!("Failure strategy panicked");
                Some(DeliveryResult::failed(DeliveryError::failed("failure strategy panicked")))
            }
        }
    }
}
