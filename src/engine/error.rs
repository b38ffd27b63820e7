use std::{result, sync::Arc};

use thiserror::Error;
use tokio::{
    sync::broadcast::error::{RecvError, SendError},
    task::JoinError,
};

use crate::{config::ConfigError, ledger::error::LedgerError, risk::error::RiskError};

use super::state::BotStatus;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(ConfigError),

    #[error("At least one strategy must be registered")]
    NoStrategies,

    #[error("Live strategy `{name}` is not among the registered strategies")]
    UnknownLiveStrategy { name: String },

    #[error("Failed to restore the position ledger: {0}")]
    RestoreLedger(LedgerError),

    #[error("Failed to restore the risk state: {0}")]
    RestoreRisk(RiskError),

    #[error("Bot process already shutdown error")]
    BotAlreadyShutdown,

    #[error("Bot process already terminated error, status: {0}")]
    BotAlreadyTerminated(BotStatus),

    #[error("Bot shutdown procedure failed: {0}")]
    BotShutdownFailed(Arc<BotProcessFatalError>),
}

pub type Result<T> = result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum BotProcessFatalError {
    #[error("[TaskJoin] {0}")]
    BotProcessTaskJoin(JoinError),

    #[error("Failed to send bot process shutdown signal error: {0}")]
    SendShutdownSignalFailed(SendError<()>),

    #[error("Shutdown signal channel recv error: {0}")]
    ShutdownSignalRecv(RecvError),

    #[error("Bot shutdown process timeout error")]
    ShutdownTimeout,
}

pub(crate) type BotProcessFatalResult<T> = result::Result<T, BotProcessFatalError>;
