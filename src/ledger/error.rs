use std::result;

use thiserror::Error;

use crate::{broker::TradeId, db::error::DbError};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("[Db] {0}")]
    Db(#[from] DbError),

    #[error("Trade {trade_id} is not tracked")]
    UnknownTrade { trade_id: TradeId },
}

pub type Result<T> = result::Result<T, LedgerError>;
