use chrono::{DateTime, NaiveDate, Utc};

use crate::broker::TradeSide;

/// Database row mirroring one tracked position. One row per broker trade ID while the
/// position is open; removed when the position closes.
#[derive(Debug, Clone)]
pub struct TrackedPositionRow {
    pub trade_id: String,
    pub instrument: String,
    pub side: TradeSide,
    pub strategy_name: String,
    pub entry_price: f64,
    pub units: i64,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub tp1_hit: bool,
    pub best_price_seen: f64,
    pub current_stop_loss: f64,
    pub open_time: DateTime<Utc>,
    pub reason: String,
}

/// Database snapshot of the account's running risk ledger. Single row.
#[derive(Debug, Clone)]
pub struct RiskStateRow {
    pub current_balance: f64,
    pub initial_balance: f64,
    pub daily_pnl: f64,
    pub daily_trade_count: i64,
    pub win_count: i64,
    pub loss_count: i64,
    pub total_pnl: f64,
    pub last_reset_date: NaiveDate,
}
