//! Signal scanning and trade entry.
//!
//! Each scan tick pulls a fresh market snapshot, runs every registered
//! strategy over it, and routes the live strategy's verdict through the entry
//! pipeline: the one-position-per-instrument check, sizing, the risk gate, and
//! finally order placement with the stop attached. Comparison strategies only
//! ever reach the optional signal sink.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::{
    broker::{OrderGateway, TradeId},
    config::BotConfig,
    ledger::{PositionLedger, TrackedPosition},
    market::SnapshotProvider,
    notify::{Notifier, NotifyEvent, send_best_effort},
    risk::{DenyReason, RiskController, RiskVerdict},
    shared::Timeframe,
    signal::{SignalSink, SignalVerdict, WrappedStrategy},
};

pub mod error;

use error::Result;

#[derive(Debug, Clone)]
pub struct ScanConfig {
    instrument: String,
    timeframe: Timeframe,
    lookback_candles: u32,
    min_bars: usize,
}

impl From<&BotConfig> for ScanConfig {
    fn from(config: &BotConfig) -> Self {
        Self {
            instrument: config.instrument().to_string(),
            timeframe: config.timeframe(),
            lookback_candles: config.lookback_candles(),
            min_bars: config.min_bars() as usize,
        }
    }
}

/// How a scan tick ended. Only `Opened` has side effects on the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    NoSignal,
    AlreadyOpen,
    SizingFailed,
    RiskDenied(DenyReason),
    Opened(TradeId),
}

pub struct TradeOrchestrator {
    config: ScanConfig,
    gateway: Arc<dyn OrderGateway>,
    provider: Arc<dyn SnapshotProvider>,
    notifier: Arc<dyn Notifier>,
    strategies: Vec<WrappedStrategy>,
    live_strategy: String,
    sink: Option<Arc<dyn SignalSink>>,
}

impl TradeOrchestrator {
    pub(crate) fn new(
        config: ScanConfig,
        gateway: Arc<dyn OrderGateway>,
        provider: Arc<dyn SnapshotProvider>,
        notifier: Arc<dyn Notifier>,
        strategies: Vec<WrappedStrategy>,
        live_strategy: String,
        sink: Option<Arc<dyn SignalSink>>,
    ) -> Self {
        Self {
            config,
            gateway,
            provider,
            notifier,
            strategies,
            live_strategy,
            sink,
        }
    }

    /// Runs one full scan: snapshot, strategy evaluation, and (when the live
    /// strategy signals) the entry pipeline.
    pub async fn scan_tick(
        &self,
        ledger: &mut PositionLedger,
        risk: &mut RiskController,
    ) -> Result<ScanOutcome> {
        let snapshot = self
            .provider
            .snapshot(
                &self.config.instrument,
                self.config.timeframe,
                self.config.lookback_candles,
                self.config.min_bars,
            )
            .await?;

        let mut live: Option<(&WrappedStrategy, SignalVerdict)> = None;
        for strategy in &self.strategies {
            match strategy.evaluate(&snapshot).await {
                Ok(Some(verdict)) => {
                    info!(strategy = strategy.name(), %verdict, "signal");
                    if let Some(sink) = &self.sink {
                        sink.record(strategy.name(), &verdict).await;
                    }
                    if strategy.name() == self.live_strategy {
                        live = Some((strategy, verdict));
                    }
                }
                Ok(None) => {}
                // A broken comparison strategy must not block the live one.
                Err(e) if strategy.name() != self.live_strategy => {
                    warn!(strategy = strategy.name(), "strategy evaluation failed: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let Some((strategy, verdict)) = live else {
            return Ok(ScanOutcome::NoSignal);
        };

        if ledger.open_for_instrument(&self.config.instrument).is_some() {
            info!("signal ignored, position already open on {}", self.config.instrument);
            return Ok(ScanOutcome::AlreadyOpen);
        }

        // The broker's view is authoritative: an untracked trade on the
        // instrument (manual or left over from a crash) also blocks entry.
        let open_trades = self.gateway.get_open_trades().await?;
        if open_trades
            .iter()
            .any(|t| t.instrument == self.config.instrument)
        {
            warn!(
                "signal ignored, broker reports an open trade on {} the ledger does not track",
                self.config.instrument
            );
            return Ok(ScanOutcome::AlreadyOpen);
        }

        let levels = strategy.levels(&snapshot, verdict.side).await?;

        let size = risk.position_size(levels.entry_price, levels.stop_loss, None);
        if size == 0 {
            warn!(
                entry_price = levels.entry_price,
                stop_loss = levels.stop_loss,
                "cannot size the trade within the risk budget"
            );
            return Ok(ScanOutcome::SizingFailed);
        }

        match risk
            .can_open_trade(ledger, levels.entry_price, levels.stop_loss, size)
            .await?
        {
            RiskVerdict::Allowed => {}
            RiskVerdict::Denied(reason) => {
                info!(%reason, "trade denied by risk gate");
                send_best_effort(
                    self.notifier.as_ref(),
                    NotifyEvent::RiskBlocked {
                        instrument: self.config.instrument.clone(),
                        reason,
                    },
                )
                .await;

                return Ok(ScanOutcome::RiskDenied(reason));
            }
        }

        let units = verdict.side.signed_units(size);
        let fill = self
            .gateway
            .place_market_order(&self.config.instrument, units, levels.stop_loss)
            .await?;

        // Targets stay as planned from the strategy's levels; the fill price
        // becomes the entry the exit plan is anchored on.
        let position = TrackedPosition {
            trade_id: fill.trade_id.clone(),
            instrument: self.config.instrument.clone(),
            side: verdict.side,
            strategy_name: self.live_strategy.clone(),
            entry_price: fill.price,
            units,
            stop_loss: levels.stop_loss,
            take_profit_1: levels.take_profit_1,
            take_profit_2: levels.take_profit_2,
            tp1_hit: false,
            best_price_seen: fill.price,
            current_stop_loss: levels.stop_loss,
            open_time: Utc::now(),
            reason: verdict.reason.clone(),
        };
        ledger.create(position).await?;

        info!(
            trade_id = %fill.trade_id,
            side = %verdict.side,
            size,
            price = fill.price,
            "position opened"
        );
        send_best_effort(
            self.notifier.as_ref(),
            NotifyEvent::TradeOpened {
                trade_id: fill.trade_id.clone(),
                instrument: self.config.instrument.clone(),
                side: verdict.side,
                units: size,
                entry_price: fill.price,
                stop_loss: levels.stop_loss,
                take_profit_1: levels.take_profit_1,
                take_profit_2: levels.take_profit_2,
                reason: verdict.reason,
            },
        )
        .await;

        Ok(ScanOutcome::Opened(fill.trade_id))
    }
}
