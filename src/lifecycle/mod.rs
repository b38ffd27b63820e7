//! Open-position lifecycle management.
//!
//! Every monitor tick does two things, in order. First it reconciles the
//! tracked ledger against the broker's open-trade list, which is authoritative:
//! anything tracked but no longer open was closed broker-side (stop, target, or
//! manual) and is finalized here. Then it manages each surviving position
//! through the staged exit plan: partial close at the first target, stop to
//! breakeven, second target armed, and a ratcheting trailing stop.

use std::{collections::HashSet, sync::Arc};

use tracing::{info, warn};

use crate::{
    broker::{OrderGateway, TradeId, TradeModification},
    config::BotConfig,
    ledger::{PositionLedger, TrackedPosition},
    notify::{Notifier, NotifyEvent, send_best_effort},
    risk::RiskController,
    shared::BoundedRatio,
};

pub mod error;

use error::Result;

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    instrument: String,
    tp1_close_fraction: BoundedRatio,
    trailing_enabled: bool,
    trail_distance: f64,
}

impl From<&BotConfig> for LifecycleConfig {
    fn from(config: &BotConfig) -> Self {
        Self {
            instrument: config.instrument().to_string(),
            tp1_close_fraction: config.tp1_close_fraction(),
            trailing_enabled: config.trailing_enabled(),
            trail_distance: config.trail_distance(),
        }
    }
}

/// What one monitor tick did, for logging and status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorReport {
    pub closed: usize,
    pub tp1_hits: usize,
    pub stops_trailed: usize,
    pub position_errors: usize,
}

pub struct LifecycleController {
    config: LifecycleConfig,
    gateway: Arc<dyn OrderGateway>,
    notifier: Arc<dyn Notifier>,
}

impl LifecycleController {
    pub fn new(
        config: LifecycleConfig,
        gateway: Arc<dyn OrderGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            gateway,
            notifier,
        }
    }

    /// Runs one reconcile-then-manage pass over all tracked positions.
    ///
    /// The open-trade list and the price quote are fetched once per tick and
    /// shared; a failure there aborts the tick. Failures while handling an
    /// individual position are logged and retried on the next tick instead.
    pub async fn monitor_tick(
        &self,
        ledger: &mut PositionLedger,
        risk: &mut RiskController,
    ) -> Result<MonitorReport> {
        let mut report = MonitorReport::default();

        let open_trades = self.gateway.get_open_trades().await?;
        let open_ids: HashSet<TradeId> = open_trades
            .iter()
            .map(|trade| trade.trade_id.clone())
            .collect();

        let tracked_ids: Vec<TradeId> = ledger.all().map(|p| p.trade_id.clone()).collect();
        for trade_id in &tracked_ids {
            if open_ids.contains(trade_id) {
                continue;
            }

            match self.finalize_closed(trade_id, ledger, risk).await {
                Ok(true) => report.closed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(trade_id = %trade_id, "failed to finalize closed trade, will retry next tick: {e}");
                    report.position_errors += 1;
                }
            }
        }

        let managed: Vec<TradeId> = ledger.all().map(|p| p.trade_id.clone()).collect();
        if managed.is_empty() {
            return Ok(report);
        }

        let quote = self.gateway.get_price(&self.config.instrument).await?;
        for trade_id in &managed {
            let broker_stop = open_trades
                .iter()
                .find(|trade| trade.trade_id == *trade_id)
                .and_then(|trade| trade.stop_loss);

            if let Err(e) = self
                .manage_position(trade_id, quote.mid, broker_stop, ledger, risk, &mut report)
                .await
            {
                warn!(trade_id = %trade_id, "position management failed, will retry next tick: {e}");
                report.position_errors += 1;
            }
        }

        Ok(report)
    }

    /// Finalizes a position the broker no longer reports as open: drops it from
    /// the ledger, then records the realized result. The removal is persisted
    /// first so the result is recorded at most once.
    async fn finalize_closed(
        &self,
        trade_id: &TradeId,
        ledger: &mut PositionLedger,
        risk: &mut RiskController,
    ) -> Result<bool> {
        let Some(position) = ledger.remove(trade_id).await? else {
            return Ok(false);
        };

        let (realized_pl, close_reason) = match self.gateway.get_closed_trade_detail(trade_id).await
        {
            Ok(detail) => {
                if let Err(e) = risk.record_trade(detail.realized_pl).await {
                    warn!(trade_id = %trade_id, "failed to record closed trade result: {e}");
                }

                (Some(detail.realized_pl), Some(detail.close_reason))
            }
            Err(e) => {
                warn!(trade_id = %trade_id, "no close detail available, result not recorded: {e}");

                (None, None)
            }
        };

        info!(
            trade_id = %trade_id,
            instrument = position.instrument,
            realized_pl = ?realized_pl,
            "position closed broker-side"
        );
        send_best_effort(
            self.notifier.as_ref(),
            NotifyEvent::TradeClosed {
                trade_id: trade_id.clone(),
                instrument: position.instrument,
                realized_pl,
                close_reason,
            },
        )
        .await;

        Ok(true)
    }

    async fn manage_position(
        &self,
        trade_id: &TradeId,
        price: f64,
        broker_stop: Option<f64>,
        ledger: &mut PositionLedger,
        risk: &mut RiskController,
        report: &mut MonitorReport,
    ) -> Result<()> {
        let Some(position) = ledger.get(trade_id).cloned() else {
            return Ok(());
        };

        if !position.tp1_hit && position.side.reached_target(price, position.take_profit_1) {
            self.take_first_profit(&position, ledger, risk).await?;
            report.tp1_hits += 1;
            // The stop just moved to breakeven; trailing resumes next tick.
            return Ok(());
        }

        if position.tp1_hit {
            // The broker-reported stop is what counts here: a stop loosened or
            // dropped broker-side after a confirmed move never shows up in the
            // ledger's mirror.
            let reported_stop = broker_stop.unwrap_or(position.current_stop_loss);
            let mut desired_stop = position.entry_price;
            if position
                .side
                .stop_improves(position.current_stop_loss, desired_stop)
            {
                desired_stop = position.current_stop_loss;
            }

            if position.side.stop_improves(desired_stop, reported_stop) {
                self.gateway
                    .modify_trade(
                        trade_id,
                        TradeModification::stop_and_target(desired_stop, position.take_profit_2),
                    )
                    .await?;
                ledger
                    .update(trade_id, |p| p.current_stop_loss = desired_stop)
                    .await?;
                info!(trade_id = %trade_id, stop = desired_stop, "post-tranche stop re-applied");
                return Ok(());
            }
        }

        if self.config.trailing_enabled {
            if self.trail_stop(trade_id, price, ledger).await? {
                report.stops_trailed += 1;
            }
        }

        Ok(())
    }

    /// First target reached: close the configured fraction, move the stop to
    /// breakeven and arm the second target on the remainder.
    async fn take_first_profit(
        &self,
        position: &TrackedPosition,
        ledger: &mut PositionLedger,
        risk: &mut RiskController,
    ) -> Result<()> {
        let size = position.size();
        let close_units = (size as f64 * self.config.tp1_close_fraction.as_f64()).floor() as u64;
        let remaining = size - close_units;

        let mut realized_pl = 0.0;
        if close_units > 0 {
            realized_pl = self
                .gateway
                .partial_close(&position.trade_id, position.side.signed_units(close_units))
                .await?;

            if let Err(e) = risk.record_partial_close(realized_pl).await {
                warn!(trade_id = %position.trade_id, "failed to record partial-close result: {e}");
            }
        }

        ledger
            .update(&position.trade_id, |p| {
                p.tp1_hit = true;
                p.units = p.side.signed_units(remaining);
            })
            .await?;

        // Breakeven and the second target ride on the remainder. If the broker
        // rejects the amendment here, the re-drive on the next tick picks it up.
        match self
            .gateway
            .modify_trade(
                &position.trade_id,
                TradeModification::stop_and_target(position.entry_price, position.take_profit_2),
            )
            .await
        {
            Ok(()) => {
                ledger
                    .update(&position.trade_id, |p| p.current_stop_loss = p.entry_price)
                    .await?;
            }
            Err(e) => {
                warn!(trade_id = %position.trade_id, "breakeven move failed after first tranche: {e}");
            }
        }

        info!(
            trade_id = %position.trade_id,
            close_units,
            remaining,
            realized_pl,
            "first target hit, tranche closed"
        );
        send_best_effort(
            self.notifier.as_ref(),
            NotifyEvent::Tp1PartialClosed {
                trade_id: position.trade_id.clone(),
                closed_units: close_units,
                remaining_units: remaining,
                realized_pl,
                new_stop: position.entry_price,
            },
        )
        .await;

        Ok(())
    }

    /// Ratchets the trailing stop. The stop follows the best price seen at a
    /// fixed distance and only ever tightens; an adverse move leaves both the
    /// watermark and the stop where they are.
    async fn trail_stop(
        &self,
        trade_id: &TradeId,
        price: f64,
        ledger: &mut PositionLedger,
    ) -> Result<bool> {
        let Some(position) = ledger.get(trade_id).cloned() else {
            return Ok(false);
        };

        let active = position.tp1_hit
            || position.side.favorable_distance(position.entry_price, price)
                >= self.config.trail_distance;
        if !active {
            return Ok(false);
        }

        let mut best = position.best_price_seen;
        if position.side.favorable_distance(best, price) > 0.0 {
            best = price;
            ledger
                .update(trade_id, |p| p.best_price_seen = best)
                .await?;
        }

        let candidate = position.side.trail_stop_from(best, self.config.trail_distance);
        if !position
            .side
            .stop_improves(candidate, position.current_stop_loss)
        {
            return Ok(false);
        }

        self.gateway
            .modify_trade(trade_id, TradeModification::stop(candidate))
            .await?;
        ledger
            .update(trade_id, |p| p.current_stop_loss = candidate)
            .await?;

        info!(
            trade_id = %trade_id,
            old_stop = position.current_stop_loss,
            new_stop = candidate,
            "trailing stop tightened"
        );
        send_best_effort(
            self.notifier.as_ref(),
            NotifyEvent::TrailingStopUpdated {
                trade_id: trade_id.clone(),
                old_stop: position.current_stop_loss,
                new_stop: candidate,
            },
        )
        .await;

        Ok(true)
    }
}
