use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{
    broker::{TradeId, TradeSide},
    db::{Database, models::TrackedPositionRow},
};

pub mod error;


use error::{LedgerError, Result};

/// One tracked open position, keyed by its broker trade ID.
///
/// Created the instant an order fill is confirmed, mutated in place as the position
/// moves through its lifecycle, and removed the tick after the broker stops reporting
/// the trade as open.
#[derive(Debug, Clone)]
pub struct TrackedPosition {
    pub trade_id: TradeId,
    pub instrument: String,
    pub side: TradeSide,
    /// Name of the strategy that opened the position.
    pub strategy_name: String,
    pub entry_price: f64,
    /// Signed remaining quantity: positive long, negative short. Shrinks when the
    /// first tranche closes.
    pub units: i64,
    /// Stop price as originally proposed at open.
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    /// Monotonic: flips false -> true when the first tranche close is confirmed,
    /// never reverts.
    pub tp1_hit: bool,
    /// Ratchets favorably only; the trailing stop is computed from this.
    pub best_price_seen: f64,
    /// Mirrors the last broker-confirmed stop. Only ever moves toward locking in more
    /// profit or to breakeven, never loosened.
    pub current_stop_loss: f64,
    pub open_time: DateTime<Utc>,
    /// Human-readable signal justification.
    pub reason: String,
}

impl TrackedPosition {
    /// Unsigned remaining size.
    pub fn size(&self) -> u64 {
        self.units.unsigned_abs()
    }
}

impl From<&TrackedPosition> for TrackedPositionRow {
    fn from(value: &TrackedPosition) -> Self {
        Self {
            trade_id: value.trade_id.as_str().to_string(),
            instrument: value.instrument.clone(),
            side: value.side,
            strategy_name: value.strategy_name.clone(),
            entry_price: value.entry_price,
            units: value.units,
            stop_loss: value.stop_loss,
            take_profit_1: value.take_profit_1,
            take_profit_2: value.take_profit_2,
            tp1_hit: value.tp1_hit,
            best_price_seen: value.best_price_seen,
            current_stop_loss: value.current_stop_loss,
            open_time: value.open_time,
            reason: value.reason.clone(),
        }
    }
}

impl From<TrackedPositionRow> for TrackedPosition {
    fn from(value: TrackedPositionRow) -> Self {
        Self {
            trade_id: TradeId::new(value.trade_id),
            instrument: value.instrument,
            side: value.side,
            strategy_name: value.strategy_name,
            entry_price: value.entry_price,
            units: value.units,
            stop_loss: value.stop_loss,
            take_profit_1: value.take_profit_1,
            take_profit_2: value.take_profit_2,
            tp1_hit: value.tp1_hit,
            best_price_seen: value.best_price_seen,
            current_stop_loss: value.current_stop_loss,
            open_time: value.open_time,
            reason: value.reason,
        }
    }
}

/// Authoritative in-memory map of tracked open positions plus its durable mirror.
///
/// Every mutation is persisted before the call returns. The ledger does not talk to
/// the broker; reconciliation against the broker's open-trade list is the lifecycle
/// controller's job.
pub struct PositionLedger {
    positions: HashMap<TradeId, TrackedPosition>,
    db: Arc<Database>,
}

impl PositionLedger {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            positions: HashMap::new(),
            db,
        }
    }

    /// Loads every persisted position into memory. Must run once at startup, before
    /// the first scan or monitor tick.
    pub async fn restore(&mut self) -> Result<usize> {
        let rows = self.db.positions.load_all().await?;
        let count = rows.len();

        self.positions = rows
            .into_iter()
            .map(TrackedPosition::from)
            .map(|p| (p.trade_id.clone(), p))
            .collect();

        Ok(count)
    }

    /// Inserts a new tracked position and persists it.
    ///
    /// Broker trade IDs are unique per fill, so a duplicate should not happen; if it
    /// does, the existing entry is overwritten with a warning.
    pub async fn create(&mut self, position: TrackedPosition) -> Result<()> {
        if self.positions.contains_key(&position.trade_id) {
            warn!(
                trade_id = %position.trade_id,
                "duplicate trade id on create, overwriting existing entry"
            );
        }

        self.db
            .positions
            .upsert(&TrackedPositionRow::from(&position))
            .await?;

        self.positions.insert(position.trade_id.clone(), position);

        Ok(())
    }

    pub fn get(&self, trade_id: &TradeId) -> Option<&TrackedPosition> {
        self.positions.get(trade_id)
    }

    pub fn contains(&self, trade_id: &TradeId) -> bool {
        self.positions.contains_key(trade_id)
    }

    /// Applies `mutator` to the tracked position and persists the result before
    /// returning.
    pub async fn update(
        &mut self,
        trade_id: &TradeId,
        mutator: impl FnOnce(&mut TrackedPosition),
    ) -> Result<()> {
        let position = self
            .positions
            .get_mut(trade_id)
            .ok_or_else(|| LedgerError::UnknownTrade {
                trade_id: trade_id.clone(),
            })?;

        mutator(position);

        self.db
            .positions
            .upsert(&TrackedPositionRow::from(&*position))
            .await?;

        Ok(())
    }

    /// Removes a tracked position, persisting the removal. Returns the removed entry,
    /// if any.
    pub async fn remove(&mut self, trade_id: &TradeId) -> Result<Option<TrackedPosition>> {
        if !self.positions.contains_key(trade_id) {
            return Ok(None);
        }

        self.db.positions.remove(trade_id.as_str()).await?;

        Ok(self.positions.remove(trade_id))
    }

    pub fn all(&self) -> impl Iterator<Item = &TrackedPosition> {
        self.positions.values()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Returns the open tracked position on `instrument`, if one exists.
    pub fn open_for_instrument(&self, instrument: &str) -> Option<&TrackedPosition> {
        self.positions
            .values()
            .find(|p| p.instrument == instrument)
    }
}
