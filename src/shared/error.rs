use thiserror::Error;

use super::{BoundedRatio, RiskPercent};

#[derive(Error, Debug)]
pub enum RiskPercentValidationError {
    #[error("Invalid risk percent, must be greater than 0")]
    TooLow,

    #[error("Invalid risk percent, must be at most {}", RiskPercent::MAX)]
    TooHigh,

    #[error("Invalid risk percent, must be a finite number")]
    NotFinite,
}

#[derive(Error, Debug)]
pub enum BoundedRatioValidationError {
    #[error("Invalid ratio, must be greater than {}", BoundedRatio::MIN_EXCLUSIVE)]
    TooLow,

    #[error("Invalid ratio, must be less than {}", BoundedRatio::MAX_EXCLUSIVE)]
    TooHigh,

    #[error("Invalid ratio, must be a finite number")]
    NotFinite,
}
