use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::broker::TradeSide;

use super::super::{
    error::{DbError, Result},
    models::TrackedPositionRow,
    repositories::PositionsRepository,
};

pub(crate) struct SqlitePositionsRepo {
    pool: Arc<Pool<Sqlite>>,
}

impl SqlitePositionsRepo {
    pub fn new(pool: Arc<Pool<Sqlite>>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &Pool<Sqlite> {
        self.pool.as_ref()
    }
}

fn side_as_str(side: TradeSide) -> &'static str {
    match side {
        TradeSide::Long => "Long",
        TradeSide::Short => "Short",
    }
}

fn parse_side(raw: &str) -> Result<TradeSide> {
    match raw {
        "Long" => Ok(TradeSide::Long),
        "Short" => Ok(TradeSide::Short),
        other => Err(DbError::Corrupt {
            table: "tracked_positions",
            detail: format!("unknown side '{other}'"),
        }),
    }
}

/// Timestamps are stored as RFC 3339 text so chrono values round-trip exactly.
fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DbError::Corrupt {
            table: "tracked_positions",
            detail: format!("invalid open_time '{raw}': {e}"),
        })
}

fn row_from_sqlite(row: &SqliteRow) -> Result<TrackedPositionRow> {
    let side_raw: String = row.try_get("side").map_err(DbError::Query)?;
    let open_time_raw: String = row.try_get("open_time").map_err(DbError::Query)?;

    Ok(TrackedPositionRow {
        trade_id: row.try_get("trade_id").map_err(DbError::Query)?,
        instrument: row.try_get("instrument").map_err(DbError::Query)?,
        side: parse_side(&side_raw)?,
        strategy_name: row.try_get("strategy_name").map_err(DbError::Query)?,
        entry_price: row.try_get("entry_price").map_err(DbError::Query)?,
        units: row.try_get("units").map_err(DbError::Query)?,
        stop_loss: row.try_get("stop_loss").map_err(DbError::Query)?,
        take_profit_1: row.try_get("take_profit_1").map_err(DbError::Query)?,
        take_profit_2: row.try_get("take_profit_2").map_err(DbError::Query)?,
        tp1_hit: row.try_get("tp1_hit").map_err(DbError::Query)?,
        best_price_seen: row.try_get("best_price_seen").map_err(DbError::Query)?,
        current_stop_loss: row.try_get("current_stop_loss").map_err(DbError::Query)?,
        open_time: parse_time(&open_time_raw)?,
        reason: row.try_get("reason").map_err(DbError::Query)?,
    })
}

#[async_trait]
impl PositionsRepository for SqlitePositionsRepo {
    async fn upsert(&self, row: &TrackedPositionRow) -> Result<()> {
        sqlx::query(
            r#"
                INSERT INTO tracked_positions (
                    trade_id, instrument, side, strategy_name, entry_price, units,
                    stop_loss, take_profit_1, take_profit_2, tp1_hit,
                    best_price_seen, current_stop_loss, open_time, reason
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                ON CONFLICT (trade_id) DO UPDATE SET
                    instrument = excluded.instrument,
                    side = excluded.side,
                    strategy_name = excluded.strategy_name,
                    entry_price = excluded.entry_price,
                    units = excluded.units,
                    stop_loss = excluded.stop_loss,
                    take_profit_1 = excluded.take_profit_1,
                    take_profit_2 = excluded.take_profit_2,
                    tp1_hit = excluded.tp1_hit,
                    best_price_seen = excluded.best_price_seen,
                    current_stop_loss = excluded.current_stop_loss,
                    open_time = excluded.open_time,
                    reason = excluded.reason
            "#,
        )
        .bind(&row.trade_id)
        .bind(&row.instrument)
        .bind(side_as_str(row.side))
        .bind(&row.strategy_name)
        .bind(row.entry_price)
        .bind(row.units)
        .bind(row.stop_loss)
        .bind(row.take_profit_1)
        .bind(row.take_profit_2)
        .bind(row.tp1_hit)
        .bind(row.best_price_seen)
        .bind(row.current_stop_loss)
        .bind(row.open_time.to_rfc3339())
        .bind(&row.reason)
        .execute(self.pool())
        .await
        .map_err(DbError::Query)?;

        Ok(())
    }

    async fn remove(&self, trade_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM tracked_positions WHERE trade_id = ?1")
            .bind(trade_id)
            .execute(self.pool())
            .await
            .map_err(DbError::Query)?;

        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<TrackedPositionRow>> {
        let rows = sqlx::query("SELECT * FROM tracked_positions ORDER BY open_time ASC")
            .fetch_all(self.pool())
            .await
            .map_err(DbError::Query)?;

        rows.iter().map(row_from_sqlite).collect()
    }
}
