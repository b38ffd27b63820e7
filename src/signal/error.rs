use std::result;

use thiserror::Error;

use crate::util::PanicPayload;

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("`SignalStrategy::evaluate` panicked: {0}")]
    EvaluatePanicked(PanicPayload),

    #[error("`SignalStrategy::evaluate` error: {0}")]
    EvaluateError(String),

    #[error("`SignalStrategy::levels` panicked: {0}")]
    LevelsPanicked(PanicPayload),

    #[error("`SignalStrategy::levels` error: {0}")]
    LevelsError(String),

    #[error("Strategy produced inverted levels, entry {entry_price} stop {stop_loss}")]
    InvalidLevels { entry_price: f64, stop_loss: f64 },
}

pub type Result<T> = result::Result<T, SignalError>;
