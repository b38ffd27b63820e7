use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::shared::Timeframe;

pub mod error;
mod retry;

pub use retry::RetryingGateway;

use error::Result;

/// Broker-assigned trade identifier. Opaque, unique per fill, immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TradeId(String);

impl TradeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TradeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum TradeSide {
    Long,
    Short,
}

impl TradeSide {
    /// Derives the side from a broker-reported signed unit quantity.
    pub fn from_units(units: i64) -> Option<Self> {
        match units {
            u if u > 0 => Some(Self::Long),
            u if u < 0 => Some(Self::Short),
            _ => None,
        }
    }

    /// Converts an unsigned size into the signed unit convention the broker expects.
    pub fn signed_units(&self, size: u64) -> i64 {
        match self {
            Self::Long => size as i64,
            Self::Short => -(size as i64),
        }
    }

    /// Returns `true` if `price` has reached `target` in this side's profitable direction.
    pub fn reached_target(&self, price: f64, target: f64) -> bool {
        match self {
            Self::Long => price >= target,
            Self::Short => price <= target,
        }
    }

    /// Returns how far `price` has moved in this side's favor relative to `reference`.
    /// Negative values mean an adverse move.
    pub fn favorable_distance(&self, reference: f64, price: f64) -> f64 {
        match self {
            Self::Long => price - reference,
            Self::Short => reference - price,
        }
    }

    /// Returns `true` if stop `candidate` locks in strictly more profit than `current`.
    pub fn stop_improves(&self, candidate: f64, current: f64) -> bool {
        match self {
            Self::Long => candidate > current,
            Self::Short => candidate < current,
        }
    }

    /// Computes a trailing stop candidate at `trail_distance` behind `best_price`.
    pub fn trail_stop_from(&self, best_price: f64, trail_distance: f64) -> f64 {
        match self {
            Self::Long => best_price - trail_distance,
            Self::Short => best_price + trail_distance,
        }
    }
}

/// A completed or forming OHLC price bar.
#[derive(Debug, Clone)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    /// `false` while the bar is still forming. Incomplete bars must not feed analysis.
    pub complete: bool,
}

/// Current quote for an instrument.
#[derive(Debug, Clone, Copy)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
    pub mid: f64,
}

/// One entry of the broker's authoritative open-trade list.
#[derive(Debug, Clone)]
pub struct OpenTrade {
    pub trade_id: TradeId,
    pub instrument: String,
    /// Signed: positive long, negative short.
    pub units: i64,
    /// Current price of the trade as reported by the broker.
    pub price: f64,
    /// Broker-side stop order price, when one is attached.
    pub stop_loss: Option<f64>,
    pub unrealized_pl: f64,
}

impl OpenTrade {
    pub fn side(&self) -> Option<TradeSide> {
        TradeSide::from_units(self.units)
    }

    pub fn size(&self) -> u64 {
        self.units.unsigned_abs()
    }
}

/// Confirmation of a filled market order.
#[derive(Debug, Clone)]
pub struct OrderFill {
    pub trade_id: TradeId,
    pub order_id: Option<String>,
    /// Actual fill price.
    pub price: f64,
}

/// Post-close detail for a trade no longer on the open list. Best-effort data.
#[derive(Debug, Clone)]
pub struct ClosedTradeDetail {
    pub entry_price: f64,
    pub exit_price: f64,
    pub realized_pl: f64,
    pub close_reason: String,
}

/// Stop/limit amendments applied to an open trade. `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct TradeModification {
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

impl TradeModification {
    pub fn stop(stop_loss: f64) -> Self {
        Self {
            stop_loss: Some(stop_loss),
            take_profit: None,
        }
    }

    pub fn stop_and_target(stop_loss: f64, take_profit: f64) -> Self {
        Self {
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
        }
    }
}

/// Boundary to the broker's REST API.
///
/// Implementations are thin I/O wrappers with no business logic; transient failures
/// should surface as [`BrokerError::Transport`] so the retry layer can distinguish them
/// from permanent rejections.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Returns the broker's current open-trade list, the authoritative view of what is
    /// actually running on the account.
    async fn get_open_trades(&self) -> Result<Vec<OpenTrade>>;

    /// Submits a market order with a stop-loss attached. `units` is signed.
    async fn place_market_order(
        &self,
        instrument: &str,
        units: i64,
        stop_loss: f64,
    ) -> Result<OrderFill>;

    /// Closes part of an open trade. `units` is signed and must not exceed the trade's
    /// remaining quantity. Returns the realized P&L of the closed tranche.
    async fn partial_close(&self, trade_id: &TradeId, units: i64) -> Result<f64>;

    /// Amends the stop and/or take-profit orders attached to an open trade.
    async fn modify_trade(&self, trade_id: &TradeId, modification: TradeModification)
    -> Result<()>;

    async fn get_price(&self, instrument: &str) -> Result<Quote>;

    /// Fetches post-close detail for a trade that is no longer open.
    async fn get_closed_trade_detail(&self, trade_id: &TradeId) -> Result<ClosedTradeDetail>;

    /// Returns up to `count` most recent candles, oldest first. The latest bar may be
    /// incomplete.
    async fn get_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: u32,
    ) -> Result<Vec<Candle>>;

    async fn get_account_balance(&self) -> Result<f64>;
}
