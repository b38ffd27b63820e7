use std::result;

use thiserror::Error;

use crate::{broker::error::BrokerError, db::error::DbError};

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("[Broker] {0}")]
    Broker(#[from] BrokerError),

    #[error("[Db] {0}")]
    Db(#[from] DbError),
}

pub type Result<T> = result::Result<T, RiskError>;
