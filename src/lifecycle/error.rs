use std::result;

use thiserror::Error;

use crate::{broker::error::BrokerError, ledger::error::LedgerError, risk::error::RiskError};

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("[Broker] {0}")]
    Broker(#[from] BrokerError),

    #[error("[Ledger] {0}")]
    Ledger(#[from] LedgerError),

    #[error("[Risk] {0}")]
    Risk(#[from] RiskError),
}

pub type Result<T> = result::Result<T, LifecycleError>;
