use std::{fmt, panic::AssertUnwindSafe, result};

use async_trait::async_trait;
use futures::FutureExt;

use crate::{broker::TradeSide, market::MarketSnapshot};

pub mod error;

use error::{Result, SignalError};

/// Convenience result alias for strategy implementations outside this crate.
pub type StrategyResult<T> = result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// A strategy's directional recommendation for one market snapshot.
#[derive(Debug, Clone)]
pub struct SignalVerdict {
    pub side: TradeSide,
    /// Human-readable justification, carried through to the tracked position.
    pub reason: String,
    /// Conviction in the signal, `0..=100`.
    pub confidence: u8,
}

impl fmt::Display for SignalVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}%): {}",
            self.side, self.confidence, self.reason
        )
    }
}

/// Proposed entry and exit prices for a signal. Transient: recomputed per signal and
/// never mutated after order submission; the tracked position is the durable record
/// from that point on.
#[derive(Debug, Clone, Copy)]
pub struct EntryLevels {
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
}

impl EntryLevels {
    /// Derives both take-profit targets from the risk distance and the configured
    /// reward multiples.
    pub fn from_risk(
        side: TradeSide,
        entry_price: f64,
        stop_loss: f64,
        tp1_reward_multiple: f64,
        tp2_reward_multiple: f64,
    ) -> Self {
        let distance = (entry_price - stop_loss).abs();

        let (take_profit_1, take_profit_2) = match side {
            TradeSide::Long => (
                entry_price + tp1_reward_multiple * distance,
                entry_price + tp2_reward_multiple * distance,
            ),
            TradeSide::Short => (
                entry_price - tp1_reward_multiple * distance,
                entry_price - tp2_reward_multiple * distance,
            ),
        };

        Self {
            entry_price,
            stop_loss,
            take_profit_1,
            take_profit_2,
        }
    }

    /// Absolute price distance between entry and stop.
    pub fn risk_distance(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs()
    }

    /// Reward multiple of a target relative to the risk distance, or `None` when the
    /// risk distance is zero (such levels cannot be sized and must be discarded).
    pub fn reward_multiple(&self, target: f64) -> Option<f64> {
        let distance = self.risk_distance();
        if distance == 0.0 {
            return None;
        }

        Some((target - self.entry_price).abs() / distance)
    }
}

/// Trait for implementing one trading rule-set.
///
/// Several strategies may be registered on the engine at once for side-by-side
/// comparison; exactly one of them (selected by [`name`](Self::name)) submits orders.
#[async_trait]
pub trait SignalStrategy: Send + Sync {
    /// Stable identifier, also recorded on positions this strategy opens.
    fn name(&self) -> &str;

    /// One-line human description of the rule-set.
    fn describe(&self) -> String {
        self.name().to_string()
    }

    /// Evaluates a market snapshot, returning a directional signal or `None`.
    async fn evaluate(&self, snapshot: &MarketSnapshot) -> StrategyResult<Option<SignalVerdict>>;

    /// Proposes entry, stop, and take-profit prices for a signal on `side`.
    async fn levels(&self, snapshot: &MarketSnapshot, side: TradeSide)
    -> StrategyResult<EntryLevels>;
}

/// Optional analytics boundary receiving every verdict produced during a scan,
/// including verdicts from non-live comparison strategies. Strictly best-effort.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn record(&self, strategy: &str, verdict: &SignalVerdict);
}

/// Internal wrapper providing panic protection for strategy implementations.
///
/// A panicking strategy must cost at most the current tick, never the process.
pub(crate) struct WrappedStrategy(Box<dyn SignalStrategy>);

impl WrappedStrategy {
    pub fn new(strategy: Box<dyn SignalStrategy>) -> Self {
        Self(strategy)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub async fn evaluate(&self, snapshot: &MarketSnapshot) -> Result<Option<SignalVerdict>> {
        FutureExt::catch_unwind(AssertUnwindSafe(self.0.evaluate(snapshot)))
            .await
            .map_err(|e| SignalError::EvaluatePanicked(e.into()))?
            .map_err(|e| SignalError::EvaluateError(e.to_string()))
    }

    pub async fn levels(
        &self,
        snapshot: &MarketSnapshot,
        side: TradeSide,
    ) -> Result<EntryLevels> {
        let levels = FutureExt::catch_unwind(AssertUnwindSafe(self.0.levels(snapshot, side)))
            .await
            .map_err(|e| SignalError::LevelsPanicked(e.into()))?
            .map_err(|e| SignalError::LevelsError(e.to_string()))?;

        if levels.risk_distance() == 0.0 {
            return Err(SignalError::InvalidLevels {
                entry_price: levels.entry_price,
                stop_loss: levels.stop_loss,
            });
        }

        Ok(levels)
    }
}
