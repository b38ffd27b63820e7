use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Row, Sqlite};

use super::super::{
    error::{DbError, Result},
    models::RiskStateRow,
    repositories::RiskStateRepository,
};

pub(crate) struct SqliteRiskStateRepo {
    pool: Arc<Pool<Sqlite>>,
}

impl SqliteRiskStateRepo {
    pub fn new(pool: Arc<Pool<Sqlite>>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &Pool<Sqlite> {
        self.pool.as_ref()
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| DbError::Corrupt {
        table: "risk_state",
        detail: format!("invalid last_reset_date '{raw}': {e}"),
    })
}

#[async_trait]
impl RiskStateRepository for SqliteRiskStateRepo {
    async fn save(&self, row: &RiskStateRow) -> Result<()> {
        sqlx::query(
            r#"
                INSERT INTO risk_state (
                    id, current_balance, initial_balance, daily_pnl, daily_trade_count,
                    win_count, loss_count, total_pnl, last_reset_date
                )
                VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT (id) DO UPDATE SET
                    current_balance = excluded.current_balance,
                    initial_balance = excluded.initial_balance,
                    daily_pnl = excluded.daily_pnl,
                    daily_trade_count = excluded.daily_trade_count,
                    win_count = excluded.win_count,
                    loss_count = excluded.loss_count,
                    total_pnl = excluded.total_pnl,
                    last_reset_date = excluded.last_reset_date
            "#,
        )
        .bind(row.current_balance)
        .bind(row.initial_balance)
        .bind(row.daily_pnl)
        .bind(row.daily_trade_count)
        .bind(row.win_count)
        .bind(row.loss_count)
        .bind(row.total_pnl)
        .bind(row.last_reset_date.format(DATE_FORMAT).to_string())
        .execute(self.pool())
        .await
        .map_err(DbError::Query)?;

        Ok(())
    }

    async fn load(&self) -> Result<Option<RiskStateRow>> {
        let row_opt = sqlx::query("SELECT * FROM risk_state WHERE id = 1")
            .fetch_optional(self.pool())
            .await
            .map_err(DbError::Query)?;

        let Some(row) = row_opt else {
            return Ok(None);
        };

        let date_raw: String = row.try_get("last_reset_date").map_err(DbError::Query)?;

        Ok(Some(RiskStateRow {
            current_balance: row.try_get("current_balance").map_err(DbError::Query)?,
            initial_balance: row.try_get("initial_balance").map_err(DbError::Query)?,
            daily_pnl: row.try_get("daily_pnl").map_err(DbError::Query)?,
            daily_trade_count: row.try_get("daily_trade_count").map_err(DbError::Query)?,
            win_count: row.try_get("win_count").map_err(DbError::Query)?,
            loss_count: row.try_get("loss_count").map_err(DbError::Query)?,
            total_pnl: row.try_get("total_pnl").map_err(DbError::Query)?,
            last_reset_date: parse_date(&date_raw)?,
        }))
    }
}
