use std::result;

use thiserror::Error;

use crate::{
    broker::error::BrokerError, ledger::error::LedgerError, market::error::MarketError,
    risk::error::RiskError, signal::error::SignalError,
};

#[derive(Error, Debug)]
pub enum OrchestrateError {
    #[error("[Market] {0}")]
    Market(#[from] MarketError),

    #[error("[Signal] {0}")]
    Signal(#[from] SignalError),

    #[error("[Broker] {0}")]
    Broker(#[from] BrokerError),

    #[error("[Ledger] {0}")]
    Ledger(#[from] LedgerError),

    #[error("[Risk] {0}")]
    Risk(#[from] RiskError),
}

pub type Result<T> = result::Result<T, OrchestrateError>;
