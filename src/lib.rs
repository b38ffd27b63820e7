#![doc = include_str!("../README.md")]

/// Exports [`OrderGateway`] and the broker-side models it exchanges.
///
/// [`OrderGateway`]: crate::broker::OrderGateway
pub mod broker;
mod config;
mod db;
/// Exports [`BotEngine`], [`BotController`], and the process status types.
///
/// [`BotEngine`]: crate::engine::BotEngine
/// [`BotController`]: crate::engine::BotController
pub mod engine;
/// Exports [`PositionLedger`] and the tracked position record.
///
/// [`PositionLedger`]: crate::ledger::PositionLedger
pub mod ledger;
/// Exports [`LifecycleController`], the staged-exit manager for open positions.
///
/// [`LifecycleController`]: crate::lifecycle::LifecycleController
pub mod lifecycle;
/// Exports [`SnapshotProvider`] and the market snapshot types strategies consume.
///
/// [`SnapshotProvider`]: crate::market::SnapshotProvider
pub mod market;
/// Exports [`Notifier`] and the trade lifecycle events it delivers.
///
/// [`Notifier`]: crate::notify::Notifier
pub mod notify;
/// Exports [`TradeOrchestrator`] and the scan outcome types.
///
/// [`TradeOrchestrator`]: crate::orchestrate::TradeOrchestrator
pub mod orchestrate;
/// Exports [`RiskController`] and the account risk accounting types.
///
/// [`RiskController`]: crate::risk::RiskController
pub mod risk;
mod shared;
/// Exports [`SignalStrategy`] and other types related to signal evaluation.
///
/// [`SignalStrategy`]: crate::signal::SignalStrategy
pub mod signal;
#[cfg(test)]
pub(crate) mod testkit;
mod util;

pub use config::BotConfig;
pub use db::Database;

/// Error types returned by `tranchor`.
pub mod error {
    pub use super::broker::error::BrokerError;
    pub use super::config::ConfigError;
    pub use super::db::error::DbError;
    pub use super::engine::error::{BotProcessFatalError, EngineError};
    pub use super::ledger::error::LedgerError;
    pub use super::lifecycle::error::LifecycleError;
    pub use super::market::error::MarketError;
    pub use super::orchestrate::error::OrchestrateError;
    pub use super::risk::error::RiskError;
    pub use super::shared::error::{BoundedRatioValidationError, RiskPercentValidationError};
    pub use super::signal::error::SignalError;
    pub use super::util::PanicPayload;

    /// Convenience general-purpose Result type alias.
    pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
}

/// Exports database row models and shared configuration value types.
pub mod models {
    pub use super::db::models::{RiskStateRow, TrackedPositionRow};
    pub use super::shared::{BoundedRatio, RiskPercent, Timeframe};
}
