use std::result;

use thiserror::Error;

use crate::broker::error::BrokerError;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Not enough completed bars for analysis, have {have}, need {need}")]
    NotEnoughBars { have: usize, need: usize },

    #[error("[Broker] {0}")]
    Broker(#[from] BrokerError),
}

pub type Result<T> = result::Result<T, MarketError>;
