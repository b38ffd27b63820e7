//! Account-level risk accounting and admission control.
//!
//! The [`RiskController`] owns the persistent [`RiskState`] and gates every new
//! trade through daily-loss and portfolio-heat checks. Checks are evaluated in a
//! fixed order and fail closed: a trade is admitted only when every gate passes.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use strum::Display;
use tracing::warn;

use crate::{
    broker::{OpenTrade, OrderGateway},
    config::BotConfig,
    db::{Database, models::RiskStateRow},
    ledger::PositionLedger,
    shared::{BoundedRatio, RiskPercent},
    util::DateTimeExt,
};

pub mod error;

use error::Result;

#[derive(Debug, Clone)]
pub struct RiskControllerConfig {
    default_risk: RiskPercent,
    min_units: u64,
    max_units: u64,
    max_daily_loss: f64,
    max_portfolio_heat: BoundedRatio,
}

impl RiskControllerConfig {
    pub fn default_risk(&self) -> RiskPercent {
        self.default_risk
    }

    pub fn min_units(&self) -> u64 {
        self.min_units
    }

    pub fn max_units(&self) -> u64 {
        self.max_units
    }

    pub fn max_daily_loss(&self) -> f64 {
        self.max_daily_loss
    }

    pub fn max_portfolio_heat(&self) -> BoundedRatio {
        self.max_portfolio_heat
    }
}

impl From<&BotConfig> for RiskControllerConfig {
    fn from(config: &BotConfig) -> Self {
        Self {
            default_risk: config.default_risk(),
            min_units: config.min_units(),
            max_units: config.max_units(),
            max_daily_loss: config.max_daily_loss(),
            max_portfolio_heat: config.max_portfolio_heat(),
        }
    }
}

/// Running account counters, mirrored to the database after every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskState {
    pub current_balance: f64,
    pub initial_balance: f64,
    pub daily_pnl: f64,
    pub daily_trade_count: u32,
    pub win_count: u32,
    pub loss_count: u32,
    pub total_pnl: f64,
    pub last_reset_date: NaiveDate,
}

impl RiskState {
    fn starting_at(balance: f64) -> Self {
        Self {
            current_balance: balance,
            initial_balance: balance,
            daily_pnl: 0.0,
            daily_trade_count: 0,
            win_count: 0,
            loss_count: 0,
            total_pnl: 0.0,
            last_reset_date: Utc::now().utc_date(),
        }
    }

    /// Win rate over all recorded closed trades, as a percentage. `None` until
    /// at least one trade has been recorded.
    pub fn win_rate(&self) -> Option<f64> {
        let decided = self.win_count + self.loss_count;
        if decided == 0 {
            return None;
        }

        Some(self.win_count as f64 / decided as f64 * 100.0)
    }
}

impl From<RiskStateRow> for RiskState {
    fn from(row: RiskStateRow) -> Self {
        Self {
            current_balance: row.current_balance,
            initial_balance: row.initial_balance,
            daily_pnl: row.daily_pnl,
            daily_trade_count: row.daily_trade_count.max(0) as u32,
            win_count: row.win_count.max(0) as u32,
            loss_count: row.loss_count.max(0) as u32,
            total_pnl: row.total_pnl,
            last_reset_date: row.last_reset_date,
        }
    }
}

impl From<&RiskState> for RiskStateRow {
    fn from(state: &RiskState) -> Self {
        Self {
            current_balance: state.current_balance,
            initial_balance: state.initial_balance,
            daily_pnl: state.daily_pnl,
            daily_trade_count: state.daily_trade_count as i64,
            win_count: state.win_count as i64,
            loss_count: state.loss_count as i64,
            total_pnl: state.total_pnl,
            last_reset_date: state.last_reset_date,
        }
    }
}

/// Why a proposed trade was refused admission.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    DailyLossLimit,
    PortfolioHeatExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskVerdict {
    Allowed,
    Denied(DenyReason),
}

impl RiskVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Point-in-time account overview, assembled on demand for reporting.
#[derive(Debug, Clone)]
pub struct PortfolioSummary {
    pub balance: f64,
    pub total_pnl: f64,
    pub daily_pnl: f64,
    pub daily_trade_count: u32,
    pub win_rate: Option<f64>,
    pub open_positions: usize,
    pub portfolio_heat: f64,
}

pub struct RiskController {
    config: RiskControllerConfig,
    gateway: Arc<dyn OrderGateway>,
    db: Arc<Database>,
    state: RiskState,
}

impl RiskController {
    /// Loads the persisted risk state, or seeds a fresh one from the live
    /// account balance when none exists yet. Failure to obtain a balance for
    /// the very first run is surfaced so startup can abort.
    pub async fn restore(
        config: RiskControllerConfig,
        gateway: Arc<dyn OrderGateway>,
        db: Arc<Database>,
    ) -> Result<Self> {
        let state = match db.risk_state.load().await? {
            Some(row) => RiskState::from(row),
            None => {
                let balance = gateway.get_account_balance().await?;
                let state = RiskState::starting_at(balance);
                db.risk_state.save(&RiskStateRow::from(&state)).await?;

                state
            }
        };

        Ok(Self {
            config,
            gateway,
            db,
            state,
        })
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    /// Refreshes the cached balance from the broker. On any failure the stale
    /// value is kept so sizing and heat checks can continue; the returned
    /// balance is whichever value is current after the attempt.
    pub async fn sync_balance(&mut self) -> f64 {
        match self.gateway.get_account_balance().await {
            Ok(balance) => {
                self.state.current_balance = balance;
                if let Err(e) = self.db.risk_state.save(&RiskStateRow::from(&self.state)).await {
                    warn!("failed to persist synced balance: {e}");
                }
            }
            Err(e) => {
                warn!(
                    "balance sync failed, keeping stale balance {:.2}: {e}",
                    self.state.current_balance
                );
            }
        }

        self.state.current_balance
    }

    /// Position size in whole units for a proposed entry/stop pair, risking
    /// `risk` (or the configured default) of the current balance.
    ///
    /// Returns `0` when the trade cannot be sized: a zero or non-finite stop
    /// distance, or a risk budget too small for a single unit. The zero
    /// sentinel is never clamped up to the configured minimum.
    pub fn position_size(&self, entry_price: f64, stop_loss: f64, risk: Option<RiskPercent>) -> u64 {
        let distance = (entry_price - stop_loss).abs();
        if !distance.is_finite() || distance <= 0.0 {
            return 0;
        }

        let risk = risk.unwrap_or(self.config.default_risk);
        let budget = self.state.current_balance * risk.as_f64();
        let raw = (budget / distance).floor();
        if !raw.is_finite() || raw < 1.0 {
            return 0;
        }

        (raw as u64).clamp(self.config.min_units, self.config.max_units)
    }

    /// Admission gate for a proposed trade. Evaluates, in order: the daily
    /// reset, the daily loss limit, then portfolio heat including the proposed
    /// trade. Purely a read of account state; admitting a trade here does not
    /// reserve anything, so the caller must place the order before asking again.
    pub async fn can_open_trade(
        &mut self,
        ledger: &PositionLedger,
        entry_price: f64,
        stop_loss: f64,
        size: u64,
    ) -> Result<RiskVerdict> {
        self.reset_daily_if_needed().await?;

        if self.state.daily_pnl <= -self.config.max_daily_loss {
            return Ok(RiskVerdict::Denied(DenyReason::DailyLossLimit));
        }

        let open_trades = self.gateway.get_open_trades().await?;
        let proposed = (entry_price - stop_loss).abs() * size as f64;
        let heat = self.portfolio_heat(ledger, &open_trades, proposed);

        if heat > self.config.max_portfolio_heat.as_f64() {
            return Ok(RiskVerdict::Denied(DenyReason::PortfolioHeatExceeded));
        }

        Ok(RiskVerdict::Allowed)
    }

    /// Folds a realized trade result into the daily and lifetime counters and
    /// persists the updated state.
    pub async fn record_trade(&mut self, realized_pl: f64) -> Result<()> {
        self.reset_daily_if_needed().await?;

        self.state.daily_pnl += realized_pl;
        self.state.total_pnl += realized_pl;
        self.state.daily_trade_count += 1;
        if realized_pl > 0.0 {
            self.state.win_count += 1;
        } else {
            self.state.loss_count += 1;
        }

        self.db.risk_state.save(&RiskStateRow::from(&self.state)).await?;

        Ok(())
    }

    /// Folds the realized result of a partial close into the P&L totals
    /// without touching the trade counters; the position is still open, so the
    /// win/loss outcome is not yet decided.
    pub async fn record_partial_close(&mut self, realized_pl: f64) -> Result<()> {
        self.reset_daily_if_needed().await?;

        self.state.daily_pnl += realized_pl;
        self.state.total_pnl += realized_pl;
        self.db.risk_state.save(&RiskStateRow::from(&self.state)).await?;

        Ok(())
    }

    /// Zeroes the daily counters when the UTC calendar date has advanced past
    /// the stored reset date. Returns whether a reset happened.
    pub async fn reset_daily_if_needed(&mut self) -> Result<bool> {
        let today = Utc::now().utc_date();
        if today <= self.state.last_reset_date {
            return Ok(false);
        }

        self.state.daily_pnl = 0.0;
        self.state.daily_trade_count = 0;
        self.state.last_reset_date = today;
        self.db.risk_state.save(&RiskStateRow::from(&self.state)).await?;

        Ok(true)
    }

    /// Assembles a live account overview: fresh balance, open trade count and
    /// the heat currently committed across all open broker trades.
    pub async fn portfolio_summary(&mut self, ledger: &PositionLedger) -> Result<PortfolioSummary> {
        self.reset_daily_if_needed().await?;
        self.sync_balance().await;

        let open_trades = self.gateway.get_open_trades().await?;
        let heat = self.portfolio_heat(ledger, &open_trades, 0.0);

        Ok(PortfolioSummary {
            balance: self.state.current_balance,
            total_pnl: self.state.total_pnl,
            daily_pnl: self.state.daily_pnl,
            daily_trade_count: self.state.daily_trade_count,
            win_rate: self.state.win_rate(),
            open_positions: open_trades.len(),
            portfolio_heat: heat,
        })
    }

    /// Fraction of the current balance at risk across `open_trades` plus
    /// `proposed_risk` currency units. A trade with no broker-side stop falls
    /// back to the tracked stop from the ledger; with neither it contributes
    /// zero and is logged, since its risk cannot be bounded.
    fn portfolio_heat(
        &self,
        ledger: &PositionLedger,
        open_trades: &[OpenTrade],
        proposed_risk: f64,
    ) -> f64 {
        if self.state.current_balance <= 0.0 {
            return f64::INFINITY;
        }

        let mut at_risk = proposed_risk;
        for trade in open_trades {
            let stop = trade
                .stop_loss
                .or_else(|| ledger.get(&trade.trade_id).map(|p| p.current_stop_loss));

            match stop {
                Some(stop) => at_risk += (trade.price - stop).abs() * trade.size() as f64,
                None => warn!(
                    "open trade {} has no stop on record, excluded from heat",
                    trade.trade_id
                ),
            }
        }

        at_risk / self.state.current_balance
    }
}

#[cfg(test)]
mod tests;
