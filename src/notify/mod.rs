//! Outbound event notifications.
//!
//! The bot reports trade lifecycle milestones through a [`Notifier`] supplied by
//! the consumer (Telegram, Slack, a log file). Delivery is best effort: a failed
//! notification is logged and never blocks or aborts trading.

use std::{fmt, result, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

use crate::{
    broker::{TradeId, TradeSide},
    risk::DenyReason,
};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("[Delivery] {0}")]
    Delivery(String),
}

pub type Result<T> = result::Result<T, NotifyError>;

/// A milestone worth telling the operator about.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyEvent {
    TradeOpened {
        trade_id: TradeId,
        instrument: String,
        side: TradeSide,
        units: u64,
        entry_price: f64,
        stop_loss: f64,
        take_profit_1: f64,
        take_profit_2: f64,
        reason: String,
    },
    Tp1PartialClosed {
        trade_id: TradeId,
        closed_units: u64,
        remaining_units: u64,
        realized_pl: f64,
        new_stop: f64,
    },
    TrailingStopUpdated {
        trade_id: TradeId,
        old_stop: f64,
        new_stop: f64,
    },
    TradeClosed {
        trade_id: TradeId,
        instrument: String,
        realized_pl: Option<f64>,
        close_reason: Option<String>,
    },
    RiskBlocked {
        instrument: String,
        reason: DenyReason,
    },
    TransientError {
        context: String,
        detail: String,
    },
}

impl fmt::Display for NotifyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TradeOpened {
                trade_id,
                instrument,
                side,
                units,
                entry_price,
                stop_loss,
                take_profit_1,
                take_profit_2,
                reason,
            } => write!(
                f,
                "Opened {side} {units} {instrument} @ {entry_price:.2} \
                 (SL {stop_loss:.2}, TP1 {take_profit_1:.2}, TP2 {take_profit_2:.2}) \
                 [{trade_id}] {reason}"
            ),
            Self::Tp1PartialClosed {
                trade_id,
                closed_units,
                remaining_units,
                realized_pl,
                new_stop,
            } => write!(
                f,
                "TP1 hit on {trade_id}: closed {closed_units} units for {realized_pl:+.2}, \
                 {remaining_units} running, stop moved to {new_stop:.2}"
            ),
            Self::TrailingStopUpdated {
                trade_id,
                old_stop,
                new_stop,
            } => write!(f, "Trailing stop on {trade_id}: {old_stop:.2} -> {new_stop:.2}"),
            Self::TradeClosed {
                trade_id,
                instrument,
                realized_pl,
                close_reason,
            } => {
                write!(f, "Closed {instrument} [{trade_id}]")?;
                if let Some(pl) = realized_pl {
                    write!(f, " for {pl:+.2}")?;
                }
                if let Some(reason) = close_reason {
                    write!(f, " ({reason})")?;
                }
                Ok(())
            }
            Self::RiskBlocked { instrument, reason } => {
                write!(f, "Signal on {instrument} blocked by risk gate: {reason}")
            }
            Self::TransientError { context, detail } => {
                write!(f, "Transient error during {context}: {detail}")
            }
        }
    }
}

/// Consumer-supplied delivery channel for [`NotifyEvent`]s.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotifyEvent) -> Result<()>;
}

/// Delivers `event`, logging delivery failures instead of surfacing them.
pub(crate) async fn send_best_effort(notifier: &dyn Notifier, event: NotifyEvent) {
    if let Err(e) = notifier.notify(&event).await {
        tracing::warn!("notification delivery failed: {e}");
    }
}

/// Discards every event. Default when the consumer wires no notifier.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _event: &NotifyEvent) -> Result<()> {
        Ok(())
    }
}

/// Rate limiter for transient-error notifications, so a flapping broker
/// connection produces one alert per window instead of one per tick.
pub struct TransientNotifyLimiter {
    window: Duration,
    last: Option<Instant>,
}

impl TransientNotifyLimiter {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Whether a transient-error notification may be sent now. Passing
    /// consumes the window.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn transient_limiter_passes_once_per_window() {
        let mut limiter = TransientNotifyLimiter::new(Duration::from_secs(3600));

        assert!(limiter.allow());
        assert!(!limiter.allow());

        tokio::time::advance(Duration::from_secs(3601)).await;
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[test]
    fn risk_blocked_renders_reason_code() {
        let event = NotifyEvent::RiskBlocked {
            instrument: "XAU_USD".to_string(),
            reason: DenyReason::DailyLossLimit,
        };

        assert_eq!(
            event.to_string(),
            "Signal on XAU_USD blocked by risk gate: DAILY_LOSS_LIMIT"
        );
    }
}
