use std::fmt;

pub mod error;

use error::{BoundedRatioValidationError, RiskPercentValidationError};

/// Candle timeframes supported for market scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    FourHours,
    OneDay,
}

impl Timeframe {
    /// Returns the timeframe duration in minutes.
    pub const fn as_minutes(&self) -> u32 {
        match self {
            Self::OneMinute => 1,
            Self::FiveMinutes => 5,
            Self::FifteenMinutes => 15,
            Self::ThirtyMinutes => 30,
            Self::OneHour => 60,
            Self::FourHours => 240,
            Self::OneDay => 1440,
        }
    }

    /// Returns the timeframe duration in seconds.
    pub const fn as_seconds(&self) -> u32 {
        self.as_minutes() * 60
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneMinute => write!(f, "1m"),
            Self::FiveMinutes => write!(f, "5m"),
            Self::FifteenMinutes => write!(f, "15m"),
            Self::ThirtyMinutes => write!(f, "30m"),
            Self::OneHour => write!(f, "1h"),
            Self::FourHours => write!(f, "4h"),
            Self::OneDay => write!(f, "1d"),
        }
    }
}

/// Validated per-trade risk fraction of the account balance.
///
/// Bounded to `(0, 0.2]`. Risking more than 20% of the account on a single position is
/// rejected at construction time rather than at order time.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct RiskPercent(f64);

impl RiskPercent {
    /// Maximum accepted risk fraction: 20% of the balance.
    pub const MAX: f64 = 0.2;

    /// Const constructor for compile-time-known values. The caller asserts the
    /// bound; out-of-range input is a bug, not a runtime condition.
    pub(crate) const fn from_const(value: f64) -> Self {
        assert!(value > 0.0 && value <= Self::MAX);

        Self(value)
    }

    pub fn new(value: f64) -> Result<Self, RiskPercentValidationError> {
        if !value.is_finite() {
            return Err(RiskPercentValidationError::NotFinite);
        }
        if value <= 0.0 {
            return Err(RiskPercentValidationError::TooLow);
        }
        if value > Self::MAX {
            return Err(RiskPercentValidationError::TooHigh);
        }

        Ok(Self(value))
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for RiskPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0 * 100.0)
    }
}

impl TryFrom<f64> for RiskPercent {
    type Error = RiskPercentValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Validated open-interval ratio, bounded to `(0, 1)`.
///
/// Used for the first-tranche close fraction and the portfolio heat ceiling.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct BoundedRatio(f64);

impl BoundedRatio {
    pub const MIN_EXCLUSIVE: f64 = 0.0;
    pub const MAX_EXCLUSIVE: f64 = 1.0;

    /// Const constructor for compile-time-known values. Out-of-range input is
    /// a bug, not a runtime condition.
    pub(crate) const fn from_const(value: f64) -> Self {
        assert!(value > Self::MIN_EXCLUSIVE && value < Self::MAX_EXCLUSIVE);

        Self(value)
    }

    pub fn new(value: f64) -> Result<Self, BoundedRatioValidationError> {
        if !value.is_finite() {
            return Err(BoundedRatioValidationError::NotFinite);
        }
        if value <= Self::MIN_EXCLUSIVE {
            return Err(BoundedRatioValidationError::TooLow);
        }
        if value >= Self::MAX_EXCLUSIVE {
            return Err(BoundedRatioValidationError::TooHigh);
        }

        Ok(Self(value))
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for BoundedRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<f64> for BoundedRatio {
    type Error = BoundedRatioValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
