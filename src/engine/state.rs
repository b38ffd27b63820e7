use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::broadcast;

use crate::{lifecycle::MonitorReport, orchestrate::ScanOutcome};

use super::error::BotProcessFatalError;

/// Represents the current status of a running bot process.
#[derive(Debug, Clone)]
pub enum BotStatus {
    /// Bot process has been created but not yet started.
    NotInitiated,
    /// Bot process is initializing: restoring state and syncing the balance.
    Starting,
    /// Bot process is actively scanning and managing positions.
    Running,
    /// Shutdown has been initiated.
    ShutdownInitiated,
    /// Bot process has been shut down.
    Shutdown,
    /// Bot process encountered a fatal error and terminated.
    Terminated(Arc<BotProcessFatalError>),
}

impl BotStatus {
    /// Returns `true` if the bot process has stopped (either shut down or terminated).
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Shutdown | Self::Terminated(_))
    }
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitiated => write!(f, "Not initiated"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::ShutdownInitiated => write!(f, "Shutdown initiated"),
            Self::Shutdown => write!(f, "Shutdown"),
            Self::Terminated(error) => write!(f, "Terminated: {error}"),
        }
    }
}

impl From<Arc<BotProcessFatalError>> for BotStatus {
    fn from(value: Arc<BotProcessFatalError>) -> Self {
        Self::Terminated(value)
    }
}

impl From<BotProcessFatalError> for BotStatus {
    fn from(value: BotProcessFatalError) -> Self {
        Arc::new(value).into()
    }
}

/// Update events emitted while the bot runs: status changes and tick outcomes.
#[derive(Debug, Clone)]
pub enum BotUpdate {
    /// Bot status changed.
    Status(BotStatus),
    /// A scan tick completed.
    Scan(ScanOutcome),
    /// A monitor tick completed.
    Monitor(MonitorReport),
}

impl From<BotStatus> for BotUpdate {
    fn from(value: BotStatus) -> Self {
        Self::Status(value)
    }
}

impl From<ScanOutcome> for BotUpdate {
    fn from(value: ScanOutcome) -> Self {
        Self::Scan(value)
    }
}

impl From<MonitorReport> for BotUpdate {
    fn from(value: MonitorReport) -> Self {
        Self::Monitor(value)
    }
}

pub(super) type BotTransmitter = broadcast::Sender<BotUpdate>;

/// Receiver for subscribing to [`BotUpdate`]s.
pub type BotReceiver = broadcast::Receiver<BotUpdate>;

/// Trait for reading bot status and subscribing to updates.
pub trait BotReader: Send + Sync + 'static {
    /// Creates a new [`BotReceiver`] for subscribing to bot updates.
    fn update_receiver(&self) -> BotReceiver;

    /// Returns the current [`BotStatus`] as a snapshot.
    fn status_snapshot(&self) -> BotStatus;
}

pub(crate) struct BotStatusManager {
    status: Mutex<BotStatus>,
    update_tx: BotTransmitter,
}

impl BotStatusManager {
    pub fn new(update_tx: BotTransmitter) -> Arc<Self> {
        let status = Mutex::new(BotStatus::NotInitiated);

        Arc::new(Self { status, update_tx })
    }

    fn lock_status(&self) -> MutexGuard<'_, BotStatus> {
        self.status
            .lock()
            .expect("`BotStatusManager` mutex can't be poisoned")
    }

    pub fn update(&self, new_status: BotStatus) {
        let mut status_guard = self.lock_status();
        *status_guard = new_status.clone();
        drop(status_guard);

        // Ignore no-receivers errors
        let _ = self.update_tx.send(new_status.into());
    }

    pub fn transmitter(&self) -> &BotTransmitter {
        &self.update_tx
    }
}

impl BotReader for BotStatusManager {
    fn update_receiver(&self) -> BotReceiver {
        self.update_tx.subscribe()
    }

    fn status_snapshot(&self) -> BotStatus {
        self.lock_status().clone()
    }
}
