//! Engine assembly and process control.
//!
//! [`BotEngine`] is the builder: it validates the configuration, wires the
//! gateway (wrapped in the retry layer), strategies, ledger, and risk
//! controller together, and spawns the background process on
//! [`start`](BotEngine::start). The returned [`BotController`] is the handle
//! for observing status, subscribing to updates, and shutting down cleanly.

use std::sync::{Arc, Mutex};

use tokio::{sync::broadcast, time};
use tracing::info;

use crate::{
    broker::{OrderGateway, RetryingGateway},
    config::BotConfig,
    db::Database,
    ledger::PositionLedger,
    lifecycle::LifecycleController,
    market::{GatewaySnapshotProvider, SnapshotProvider},
    notify::{NoopNotifier, Notifier},
    orchestrate::TradeOrchestrator,
    risk::RiskController,
    signal::{SignalSink, SignalStrategy, WrappedStrategy},
    util::AbortOnDropHandle,
};

pub mod error;
mod process;
pub mod state;

use error::{BotProcessFatalError, BotProcessFatalResult, EngineError, Result};
use process::BotProcess;
use state::{BotReader, BotReceiver, BotStatus, BotStatusManager, BotUpdate};

#[derive(Debug, Clone)]
struct BotControllerConfig {
    shutdown_timeout: time::Duration,
}

impl From<&BotConfig> for BotControllerConfig {
    fn from(config: &BotConfig) -> Self {
        Self {
            shutdown_timeout: config.shutdown_timeout(),
        }
    }
}

/// Controller for managing and monitoring a running bot process. Provides an
/// interface to monitor status, receive updates, and perform graceful shutdown.
pub struct BotController {
    config: BotControllerConfig,
    process_handle: Mutex<Option<AbortOnDropHandle<BotProcessFatalResult<()>>>>,
    shutdown_tx: broadcast::Sender<()>,
    status_manager: Arc<BotStatusManager>,
}

impl BotController {
    fn new(
        config: &BotConfig,
        process_handle: AbortOnDropHandle<BotProcessFatalResult<()>>,
        shutdown_tx: broadcast::Sender<()>,
        status_manager: Arc<BotStatusManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: config.into(),
            process_handle: Mutex::new(Some(process_handle)),
            shutdown_tx,
            status_manager,
        })
    }

    /// Returns a [`BotReader`] interface for accessing status and updates.
    pub fn reader(&self) -> Arc<dyn BotReader> {
        self.status_manager.clone()
    }

    /// Creates a new [`BotReceiver`] for subscribing to status and tick updates.
    pub fn update_receiver(&self) -> BotReceiver {
        self.status_manager.update_receiver()
    }

    /// Returns the current [`BotStatus`] as a snapshot.
    pub fn status_snapshot(&self) -> BotStatus {
        self.status_manager.status_snapshot()
    }

    fn try_consume_handle(&self) -> Option<AbortOnDropHandle<BotProcessFatalResult<()>>> {
        self.process_handle
            .lock()
            .expect("`BotController` mutex can't be poisoned")
            .take()
    }

    /// Tries to perform a clean shutdown of the bot process and consumes the
    /// task handle. If a clean shutdown fails, the process is aborted.
    ///
    /// This method can only be called once per controller instance.
    ///
    /// Returns an error if the process had to be aborted, or if the handle was
    /// already consumed.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(mut handle) = self.try_consume_handle() else {
            return Err(EngineError::BotAlreadyShutdown);
        };

        if handle.is_finished() {
            let status = self.status_manager.status_snapshot();
            return Err(EngineError::BotAlreadyTerminated(status));
        }

        self.status_manager.update(BotStatus::ShutdownInitiated);

        let shutdown_send_res = self.shutdown_tx.send(()).map_err(|e| {
            handle.abort();
            BotProcessFatalError::SendShutdownSignalFailed(e)
        });

        let shutdown_res = match shutdown_send_res {
            Ok(_) => {
                tokio::select! {
                    join_res = &mut handle => {
                        join_res.map_err(BotProcessFatalError::BotProcessTaskJoin).and_then(|r| r)
                    }
                    _ = time::sleep(self.config.shutdown_timeout) => {
                        handle.abort();
                        Err(BotProcessFatalError::ShutdownTimeout)
                    }
                }
            }
            Err(e) => Err(e),
        };

        if let Err(e) = shutdown_res {
            let e_ref = Arc::new(e);
            self.status_manager.update(e_ref.clone().into());

            return Err(EngineError::BotShutdownFailed(e_ref));
        }

        self.status_manager.update(BotStatus::Shutdown);
        Ok(())
    }

    /// Waits until the bot process has stopped and returns the final status.
    pub async fn until_stopped(&self) -> BotStatus {
        let mut update_rx = self.update_receiver();

        let status = self.status_snapshot();
        if status.is_stopped() {
            return status;
        }

        loop {
            match update_rx.recv().await {
                Ok(update) => {
                    if let BotUpdate::Status(status) = update
                        && status.is_stopped()
                    {
                        return status;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    let status = self.status_snapshot();
                    if status.is_stopped() {
                        return status;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return self.status_snapshot(),
            }
        }
    }
}

/// Builder for configuring and starting a trading bot. Encapsulates the
/// configuration, database, broker gateway, strategies, and notification
/// channel. The bot process is started when [`start`](Self::start) is called,
/// returning a [`BotController`].
pub struct BotEngine {
    config: BotConfig,
    db: Arc<Database>,
    gateway: Arc<dyn OrderGateway>,
    notifier: Arc<dyn Notifier>,
    strategies: Vec<WrappedStrategy>,
    live_strategy: String,
    sink: Option<Arc<dyn SignalSink>>,
    provider: Option<Arc<dyn SnapshotProvider>>,
    status_manager: Arc<BotStatusManager>,
}

impl BotEngine {
    /// Creates a new bot engine. All registered strategies are evaluated each
    /// scan; only the one named by `live_strategy` submits orders.
    pub fn new(
        config: BotConfig,
        db: Arc<Database>,
        gateway: Arc<dyn OrderGateway>,
        strategies: Vec<Box<dyn SignalStrategy>>,
        live_strategy: impl ToString,
    ) -> Result<Self> {
        config.validate().map_err(EngineError::InvalidConfig)?;

        if strategies.is_empty() {
            return Err(EngineError::NoStrategies);
        }

        let live_strategy = live_strategy.to_string();
        if !strategies.iter().any(|s| s.name() == live_strategy) {
            return Err(EngineError::UnknownLiveStrategy {
                name: live_strategy,
            });
        }

        let strategies = strategies.into_iter().map(WrappedStrategy::new).collect();

        let (update_tx, _) = broadcast::channel::<BotUpdate>(1_000);
        let status_manager = BotStatusManager::new(update_tx);

        Ok(Self {
            config,
            db,
            gateway,
            notifier: Arc::new(NoopNotifier),
            strategies,
            live_strategy,
            sink: None,
            provider: None,
            status_manager,
        })
    }

    /// Sets the notification channel for trade lifecycle events.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Sets the analytics sink receiving every strategy verdict.
    pub fn with_signal_sink(mut self, sink: Arc<dyn SignalSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Overrides the market snapshot source. Defaults to the gateway's candle
    /// endpoint.
    pub fn with_snapshot_provider(mut self, provider: Arc<dyn SnapshotProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Returns a [`BotReader`] interface for accessing status and updates.
    pub fn reader(&self) -> Arc<dyn BotReader> {
        self.status_manager.clone()
    }

    /// Creates a new [`BotReceiver`] for subscribing to status and tick updates.
    pub fn update_receiver(&self) -> BotReceiver {
        self.status_manager.update_receiver()
    }

    /// Starts the bot process and returns a [`BotController`] for managing it.
    /// This consumes the engine and spawns the trading task in the background.
    ///
    /// Startup restores durable state before the first tick: tracked positions
    /// from the ledger and the risk counters (seeded from the live balance on
    /// first run). A failure in either is fatal and the process never starts.
    pub async fn start(self) -> Result<Arc<BotController>> {
        self.status_manager.update(BotStatus::Starting);

        let gateway: Arc<dyn OrderGateway> = Arc::new(RetryingGateway::new(
            self.gateway,
            self.config.max_order_trials(),
            self.config.order_retry_cooldown(),
        ));

        let provider = self
            .provider
            .unwrap_or_else(|| Arc::new(GatewaySnapshotProvider::new(gateway.clone())));

        let mut ledger = PositionLedger::new(self.db.clone());
        let restored = ledger
            .restore()
            .await
            .map_err(EngineError::RestoreLedger)?;
        info!(restored, "position ledger restored");

        let mut risk = RiskController::restore(
            (&self.config).into(),
            gateway.clone(),
            self.db.clone(),
        )
        .await
        .map_err(EngineError::RestoreRisk)?;
        risk.sync_balance().await;

        let orchestrator = TradeOrchestrator::new(
            (&self.config).into(),
            gateway.clone(),
            provider,
            self.notifier.clone(),
            self.strategies,
            self.live_strategy,
            self.sink,
        );

        let lifecycle = LifecycleController::new(
            (&self.config).into(),
            gateway,
            self.notifier.clone(),
        );

        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let process_handle = BotProcess::spawn(
            &self.config,
            shutdown_tx.clone(),
            orchestrator,
            lifecycle,
            ledger,
            risk,
            self.notifier,
            self.status_manager.clone(),
        );

        let controller = BotController::new(
            &self.config,
            process_handle,
            shutdown_tx,
            self.status_manager,
        );

        Ok(controller)
    }
}
