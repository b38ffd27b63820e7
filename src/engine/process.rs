use std::{sync::Arc, time::Duration};

use tokio::{
    sync::broadcast,
    time::{self, MissedTickBehavior},
};
use tracing::{info, warn};

use crate::{
    config::BotConfig,
    ledger::PositionLedger,
    lifecycle::LifecycleController,
    notify::{Notifier, NotifyEvent, TransientNotifyLimiter, send_best_effort},
    orchestrate::TradeOrchestrator,
    risk::RiskController,
    util::AbortOnDropHandle,
};

use super::{
    error::{BotProcessFatalError, BotProcessFatalResult},
    state::{BotStatus, BotStatusManager, BotTransmitter},
};

#[derive(Debug, Clone)]
pub(super) struct BotProcessConfig {
    scan_interval: Duration,
    monitor_interval: Duration,
    transient_notify_window: Duration,
}

impl From<&BotConfig> for BotProcessConfig {
    fn from(config: &BotConfig) -> Self {
        Self {
            scan_interval: config.scan_interval(),
            monitor_interval: config.monitor_interval(),
            transient_notify_window: config.transient_notify_window(),
        }
    }
}

pub(super) struct BotProcess {
    config: BotProcessConfig,
    orchestrator: TradeOrchestrator,
    lifecycle: LifecycleController,
    ledger: PositionLedger,
    risk: RiskController,
    notifier: Arc<dyn Notifier>,
    status_manager: Arc<BotStatusManager>,
    update_tx: BotTransmitter,
    transient_limiter: TransientNotifyLimiter,
}

impl BotProcess {
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        config: &BotConfig,
        shutdown_tx: broadcast::Sender<()>,
        orchestrator: TradeOrchestrator,
        lifecycle: LifecycleController,
        ledger: PositionLedger,
        risk: RiskController,
        notifier: Arc<dyn Notifier>,
        status_manager: Arc<BotStatusManager>,
    ) -> AbortOnDropHandle<BotProcessFatalResult<()>> {
        let config = BotProcessConfig::from(config);

        // Subscribe before spawning so a shutdown signal sent any time after
        // `start()` returns is never lost to the task's first poll.
        let shutdown_rx = shutdown_tx.subscribe();

        tokio::spawn(async move {
            let update_tx = status_manager.transmitter().clone();
            let transient_limiter = TransientNotifyLimiter::new(config.transient_notify_window);

            let process = Self {
                config,
                orchestrator,
                lifecycle,
                ledger,
                risk,
                notifier,
                status_manager,
                update_tx,
                transient_limiter,
            };

            process.run_loop(shutdown_rx).await
        })
        .into()
    }

    /// Drives the two tick timers until a shutdown signal arrives. Tick
    /// failures are recoverable by construction (each tick re-reads the broker
    /// and the ledger), so they are reported and the loop keeps going.
    async fn run_loop(
        mut self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> BotProcessFatalResult<()> {
        let mut scan_timer = time::interval(self.config.scan_interval);
        scan_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut monitor_timer = time::interval(self.config.monitor_interval);
        monitor_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.status_manager.update(BotStatus::Running);
        info!("bot process running");

        loop {
            tokio::select! {
                biased;
                shutdown_res = shutdown_rx.recv() => {
                    return match shutdown_res {
                        Ok(()) => Ok(()),
                        Err(e) => Err(BotProcessFatalError::ShutdownSignalRecv(e)),
                    };
                }
                _ = monitor_timer.tick() => self.run_monitor_tick().await,
                _ = scan_timer.tick() => self.run_scan_tick().await,
            }
        }
    }

    async fn run_scan_tick(&mut self) {
        self.risk.sync_balance().await;

        match self
            .orchestrator
            .scan_tick(&mut self.ledger, &mut self.risk)
            .await
        {
            Ok(outcome) => {
                let _ = self.update_tx.send(outcome.into());
            }
            Err(e) => self.report_transient("scan", &e.to_string()).await,
        }
    }

    async fn run_monitor_tick(&mut self) {
        match self
            .lifecycle
            .monitor_tick(&mut self.ledger, &mut self.risk)
            .await
        {
            Ok(report) => {
                let _ = self.update_tx.send(report.into());
            }
            Err(e) => self.report_transient("monitor", &e.to_string()).await,
        }
    }

    async fn report_transient(&mut self, context: &str, detail: &str) {
        warn!("{context} tick failed: {detail}");

        if self.transient_limiter.allow() {
            send_best_effort(
                self.notifier.as_ref(),
                NotifyEvent::TransientError {
                    context: context.to_string(),
                    detail: detail.to_string(),
                },
            )
            .await;
        }
    }
}
