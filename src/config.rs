//! Bot configuration.
//!
//! A single [`BotConfig`] carries every tunable; each subsystem projects the
//! slice it needs via `From<&BotConfig>` on its own config struct. Defaults
//! describe a conservative gold setup on the 15-minute timeframe.

use std::{num::NonZeroU32, time::Duration};

use thiserror::Error;

use crate::shared::{BoundedRatio, RiskPercent, Timeframe};

const DEFAULT_RISK: RiskPercent = RiskPercent::from_const(0.015);
const DEFAULT_MAX_HEAT: BoundedRatio = BoundedRatio::from_const(0.06);
const DEFAULT_TP1_FRACTION: BoundedRatio = BoundedRatio::from_const(0.6);
const DEFAULT_ORDER_TRIALS: NonZeroU32 = NonZeroU32::new(3).unwrap();

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("min_bars must be at least 1")]
    MinBarsZero,

    #[error("lookback_candles ({lookback}) must be at least min_bars ({min_bars})")]
    LookbackTooShort { lookback: u32, min_bars: u32 },

    #[error("min_units ({min_units}) must be at least 1 and at most max_units ({max_units})")]
    InvalidUnitBounds { min_units: u64, max_units: u64 },

    #[error("max_daily_loss must be a positive finite amount, got {0}")]
    InvalidMaxDailyLoss(f64),

    #[error("reward multiples must satisfy 0 < tp1 ({tp1}) < tp2 ({tp2})")]
    InvalidRewardMultiples { tp1: f64, tp2: f64 },

    #[error("trail_distance must be a positive finite price distance, got {0}")]
    InvalidTrailDistance(f64),

    #[error("{name} interval must be non-zero")]
    ZeroInterval { name: &'static str },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    instrument: String,
    timeframe: Timeframe,
    lookback_candles: u32,
    min_bars: u32,
    scan_interval: Duration,
    monitor_interval: Duration,
    default_risk: RiskPercent,
    min_units: u64,
    max_units: u64,
    max_daily_loss: f64,
    max_portfolio_heat: BoundedRatio,
    tp1_reward_multiple: f64,
    tp2_reward_multiple: f64,
    tp1_close_fraction: BoundedRatio,
    trailing_enabled: bool,
    trail_distance: f64,
    max_order_trials: NonZeroU32,
    order_retry_cooldown: Duration,
    transient_notify_window: Duration,
    shutdown_timeout: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            instrument: "XAU_USD".to_string(),
            timeframe: Timeframe::FifteenMinutes,
            lookback_candles: 200,
            min_bars: 50,
            scan_interval: Duration::from_secs(900),
            monitor_interval: Duration::from_secs(60),
            default_risk: DEFAULT_RISK,
            min_units: 1,
            max_units: 100,
            max_daily_loss: 500.0,
            max_portfolio_heat: DEFAULT_MAX_HEAT,
            tp1_reward_multiple: 1.5,
            tp2_reward_multiple: 2.5,
            tp1_close_fraction: DEFAULT_TP1_FRACTION,
            trailing_enabled: true,
            trail_distance: 10.0,
            max_order_trials: DEFAULT_ORDER_TRIALS,
            order_retry_cooldown: Duration::from_secs(5),
            transient_notify_window: Duration::from_secs(3600),
            shutdown_timeout: Duration::from_secs(6),
        }
    }
}

impl BotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks cross-field consistency. Run once at engine start; a failure here
    /// is fatal since the bot would trade with nonsensical parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_bars < 1 {
            return Err(ConfigError::MinBarsZero);
        }
        if self.lookback_candles < self.min_bars {
            return Err(ConfigError::LookbackTooShort {
                lookback: self.lookback_candles,
                min_bars: self.min_bars,
            });
        }
        if self.min_units < 1 || self.min_units > self.max_units {
            return Err(ConfigError::InvalidUnitBounds {
                min_units: self.min_units,
                max_units: self.max_units,
            });
        }
        if !self.max_daily_loss.is_finite() || self.max_daily_loss <= 0.0 {
            return Err(ConfigError::InvalidMaxDailyLoss(self.max_daily_loss));
        }
        if !(self.tp1_reward_multiple > 0.0 && self.tp2_reward_multiple > self.tp1_reward_multiple)
        {
            return Err(ConfigError::InvalidRewardMultiples {
                tp1: self.tp1_reward_multiple,
                tp2: self.tp2_reward_multiple,
            });
        }
        if !self.trail_distance.is_finite() || self.trail_distance <= 0.0 {
            return Err(ConfigError::InvalidTrailDistance(self.trail_distance));
        }
        if self.scan_interval.is_zero() {
            return Err(ConfigError::ZeroInterval { name: "scan" });
        }
        if self.monitor_interval.is_zero() {
            return Err(ConfigError::ZeroInterval { name: "monitor" });
        }

        Ok(())
    }

    pub fn with_instrument(mut self, instrument: impl Into<String>) -> Self {
        self.instrument = instrument.into();
        self
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn with_lookback_candles(mut self, lookback_candles: u32) -> Self {
        self.lookback_candles = lookback_candles;
        self
    }

    pub fn with_min_bars(mut self, min_bars: u32) -> Self {
        self.min_bars = min_bars;
        self
    }

    pub fn with_scan_interval(mut self, scan_interval: Duration) -> Self {
        self.scan_interval = scan_interval;
        self
    }

    pub fn with_monitor_interval(mut self, monitor_interval: Duration) -> Self {
        self.monitor_interval = monitor_interval;
        self
    }

    pub fn with_default_risk(mut self, default_risk: RiskPercent) -> Self {
        self.default_risk = default_risk;
        self
    }

    pub fn with_unit_bounds(mut self, min_units: u64, max_units: u64) -> Self {
        self.min_units = min_units;
        self.max_units = max_units;
        self
    }

    pub fn with_max_daily_loss(mut self, max_daily_loss: f64) -> Self {
        self.max_daily_loss = max_daily_loss;
        self
    }

    pub fn with_max_portfolio_heat(mut self, max_portfolio_heat: BoundedRatio) -> Self {
        self.max_portfolio_heat = max_portfolio_heat;
        self
    }

    pub fn with_reward_multiples(mut self, tp1: f64, tp2: f64) -> Self {
        self.tp1_reward_multiple = tp1;
        self.tp2_reward_multiple = tp2;
        self
    }

    pub fn with_tp1_close_fraction(mut self, tp1_close_fraction: BoundedRatio) -> Self {
        self.tp1_close_fraction = tp1_close_fraction;
        self
    }

    pub fn with_trailing_enabled(mut self, trailing_enabled: bool) -> Self {
        self.trailing_enabled = trailing_enabled;
        self
    }

    pub fn with_trail_distance(mut self, trail_distance: f64) -> Self {
        self.trail_distance = trail_distance;
        self
    }

    pub fn with_max_order_trials(mut self, max_order_trials: NonZeroU32) -> Self {
        self.max_order_trials = max_order_trials;
        self
    }

    pub fn with_order_retry_cooldown(mut self, order_retry_cooldown: Duration) -> Self {
        self.order_retry_cooldown = order_retry_cooldown;
        self
    }

    pub fn with_transient_notify_window(mut self, transient_notify_window: Duration) -> Self {
        self.transient_notify_window = transient_notify_window;
        self
    }

    pub fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn lookback_candles(&self) -> u32 {
        self.lookback_candles
    }

    pub fn min_bars(&self) -> u32 {
        self.min_bars
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    pub fn monitor_interval(&self) -> Duration {
        self.monitor_interval
    }

    pub fn default_risk(&self) -> RiskPercent {
        self.default_risk
    }

    pub fn min_units(&self) -> u64 {
        self.min_units
    }

    pub fn max_units(&self) -> u64 {
        self.max_units
    }

    pub fn max_daily_loss(&self) -> f64 {
        self.max_daily_loss
    }

    pub fn max_portfolio_heat(&self) -> BoundedRatio {
        self.max_portfolio_heat
    }

    pub fn tp1_reward_multiple(&self) -> f64 {
        self.tp1_reward_multiple
    }

    pub fn tp2_reward_multiple(&self) -> f64 {
        self.tp2_reward_multiple
    }

    pub fn tp1_close_fraction(&self) -> BoundedRatio {
        self.tp1_close_fraction
    }

    pub fn trailing_enabled(&self) -> bool {
        self.trailing_enabled
    }

    pub fn trail_distance(&self) -> f64 {
        self.trail_distance
    }

    pub fn max_order_trials(&self) -> NonZeroU32 {
        self.max_order_trials
    }

    pub fn order_retry_cooldown(&self) -> Duration {
        self.order_retry_cooldown
    }

    pub fn transient_notify_window(&self) -> Duration {
        self.transient_notify_window
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(BotConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_lookback_shorter_than_min_bars() {
        let config = BotConfig::default().with_lookback_candles(30).with_min_bars(50);

        assert!(matches!(
            config.validate(),
            Err(ConfigError::LookbackTooShort { .. })
        ));
    }

    #[test]
    fn rejects_zero_min_bars() {
        let config = BotConfig::default().with_min_bars(0);

        assert!(matches!(config.validate(), Err(ConfigError::MinBarsZero)));
    }

    #[test]
    fn rejects_inverted_unit_bounds() {
        let config = BotConfig::default().with_unit_bounds(50, 10);

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUnitBounds { .. })
        ));
    }

    #[test]
    fn rejects_tp2_not_beyond_tp1() {
        let config = BotConfig::default().with_reward_multiples(2.0, 2.0);

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRewardMultiples { .. })
        ));
    }

    #[test]
    fn rejects_zero_scan_interval() {
        let config = BotConfig::default().with_scan_interval(Duration::ZERO);

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroInterval { name: "scan" })
        ));
    }
}
