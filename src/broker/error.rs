use std::result;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    /// Network-level failure or a 5xx-class broker response. Eligible for retry.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The broker understood and refused the request. Retrying won't help.
    #[error("Request rejected by broker: {reason}")]
    Rejected { reason: String },

    /// A transient failure persisted through the configured retry budget.
    #[error("Retries exhausted after {attempts} attempts, last error: {last}")]
    RetriesExhausted { attempts: u32, last: Box<BrokerError> },
}

impl BrokerError {
    /// Returns `true` for failures that a bounded retry may resolve.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub type Result<T> = result::Result<T, BrokerError>;
