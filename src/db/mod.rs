use std::{str::FromStr, sync::Arc};

use sqlx::{
    Pool, Sqlite,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

pub mod error;
pub mod models;
pub(crate) mod repositories;
mod sqlite;

use error::{DbError, Result};
use repositories::{PositionsRepository, RiskStateRepository};
use sqlite::{positions::SqlitePositionsRepo, risk_state::SqliteRiskStateRepo};

const SCHEMA: &[&str] = &[
    r#"
        CREATE TABLE IF NOT EXISTS tracked_positions (
            trade_id TEXT PRIMARY KEY,
            instrument TEXT NOT NULL,
            side TEXT NOT NULL,
            strategy_name TEXT NOT NULL,
            entry_price REAL NOT NULL,
            units INTEGER NOT NULL,
            stop_loss REAL NOT NULL,
            take_profit_1 REAL NOT NULL,
            take_profit_2 REAL NOT NULL,
            tp1_hit INTEGER NOT NULL,
            best_price_seen REAL NOT NULL,
            current_stop_loss REAL NOT NULL,
            open_time TEXT NOT NULL,
            reason TEXT NOT NULL
        )
    "#,
    r#"
        CREATE TABLE IF NOT EXISTS risk_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            current_balance REAL NOT NULL,
            initial_balance REAL NOT NULL,
            daily_pnl REAL NOT NULL,
            daily_trade_count INTEGER NOT NULL,
            win_count INTEGER NOT NULL,
            loss_count INTEGER NOT NULL,
            total_pnl REAL NOT NULL,
            last_reset_date TEXT NOT NULL
        )
    "#,
];

/// Durable mirror of the position ledger and risk counters.
///
/// Backed by an embedded SQLite database. Writes are awaited by the caller before the
/// triggering operation returns, so a crash between ticks never loses more than the
/// in-flight operation itself.
pub struct Database {
    pub(crate) positions: Box<dyn PositionsRepository>,
    pub(crate) risk_state: Box<dyn RiskStateRepository>,
}

impl Database {
    /// Connects to (creating if missing) the SQLite database at `url` and sets up the
    /// schema. `url` takes the form `sqlite://path/to/state.db`.
    pub async fn connect(url: &str) -> Result<Arc<Self>> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(DbError::Connect)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(DbError::Connect)?;

        Self::from_pool(pool).await
    }

    /// Connects to a fresh in-memory database. Intended for tests.
    pub async fn connect_in_memory() -> Result<Arc<Self>> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(DbError::Connect)?;

        // A single connection keeps every query on the same in-memory instance.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(DbError::Connect)?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: Pool<Sqlite>) -> Result<Arc<Self>> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(DbError::Schema)?;
        }

        let pool = Arc::new(pool);

        Ok(Arc::new(Self {
            positions: Box::new(SqlitePositionsRepo::new(pool.clone())),
            risk_state: Box::new(SqliteRiskStateRepo::new(pool)),
        }))
    }
}
