use std::{future::Future, num::NonZeroU32, sync::Arc};

use async_trait::async_trait;
use tokio::time;
use tracing::warn;

use crate::shared::Timeframe;

use super::{
    Candle, ClosedTradeDetail, OpenTrade, OrderFill, OrderGateway, Quote, TradeId,
    TradeModification,
    error::{BrokerError, Result},
};

/// Gateway decorator applying a bounded retry with a fixed cooldown to transient broker
/// failures. Permanent rejections pass through untouched; an exhausted budget surfaces
/// as [`BrokerError::RetriesExhausted`], which callers treat as a normal recoverable
/// tick failure.
pub struct RetryingGateway {
    inner: Arc<dyn OrderGateway>,
    max_trials: NonZeroU32,
    cooldown: time::Duration,
}

impl RetryingGateway {
    pub fn new(
        inner: Arc<dyn OrderGateway>,
        max_trials: NonZeroU32,
        cooldown: time::Duration,
    ) -> Self {
        Self {
            inner,
            max_trials,
            cooldown,
        }
    }

    async fn with_retry<T, Fut>(&self, context: &str, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1u32;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    if attempt >= self.max_trials.get() {
                        return Err(BrokerError::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }

                    warn!(
                        context,
                        attempt,
                        max_trials = self.max_trials.get(),
                        error = %e,
                        "transient broker failure, retrying after cooldown"
                    );

                    time::sleep(self.cooldown).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl OrderGateway for RetryingGateway {
    async fn get_open_trades(&self) -> Result<Vec<OpenTrade>> {
        self.with_retry("get_open_trades", || self.inner.get_open_trades())
            .await
    }

    async fn place_market_order(
        &self,
        instrument: &str,
        units: i64,
        stop_loss: f64,
    ) -> Result<OrderFill> {
        self.with_retry("place_market_order", || {
            self.inner.place_market_order(instrument, units, stop_loss)
        })
        .await
    }

    async fn partial_close(&self, trade_id: &TradeId, units: i64) -> Result<f64> {
        self.with_retry("partial_close", || self.inner.partial_close(trade_id, units))
            .await
    }

    async fn modify_trade(
        &self,
        trade_id: &TradeId,
        modification: TradeModification,
    ) -> Result<()> {
        self.with_retry("modify_trade", || {
            self.inner.modify_trade(trade_id, modification)
        })
        .await
    }

    async fn get_price(&self, instrument: &str) -> Result<Quote> {
        self.with_retry("get_price", || self.inner.get_price(instrument))
            .await
    }

    async fn get_closed_trade_detail(&self, trade_id: &TradeId) -> Result<ClosedTradeDetail> {
        self.with_retry("get_closed_trade_detail", || {
            self.inner.get_closed_trade_detail(trade_id)
        })
        .await
    }

    async fn get_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: u32,
    ) -> Result<Vec<Candle>> {
        self.with_retry("get_candles", || {
            self.inner.get_candles(instrument, timeframe, count)
        })
        .await
    }

    async fn get_account_balance(&self) -> Result<f64> {
        self.with_retry("get_account_balance", || self.inner.get_account_balance())
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Gateway that fails with a transport error a fixed number of times before
    /// succeeding, counting every call it receives.
    struct FlakyGateway {
        failures: AtomicU32,
        calls: AtomicU32,
        reject: bool,
    }

    impl FlakyGateway {
        fn transient(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
                reject: false,
            }
        }

        fn rejecting() -> Self {
            Self {
                failures: AtomicU32::new(0),
                calls: AtomicU32::new(0),
                reject: true,
            }
        }

        fn next(&self) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.reject {
                return Err(BrokerError::Rejected {
                    reason: "insufficient margin".to_string(),
                });
            }

            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(BrokerError::Transport("connection reset".to_string()));
            }

            Ok(10_000.0)
        }
    }

    #[async_trait]
    impl OrderGateway for FlakyGateway {
        async fn get_open_trades(&self) -> Result<Vec<OpenTrade>> {
            self.next().map(|_| Vec::new())
        }

        async fn place_market_order(&self, _: &str, _: i64, _: f64) -> Result<OrderFill> {
            Err(BrokerError::Rejected {
                reason: "unused".to_string(),
            })
        }

        async fn partial_close(&self, _: &TradeId, _: i64) -> Result<f64> {
            self.next()
        }

        async fn modify_trade(&self, _: &TradeId, _: TradeModification) -> Result<()> {
            self.next().map(|_| ())
        }

        async fn get_price(&self, _: &str) -> Result<Quote> {
            Err(BrokerError::Rejected {
                reason: "unused".to_string(),
            })
        }

        async fn get_closed_trade_detail(&self, _: &TradeId) -> Result<ClosedTradeDetail> {
            Err(BrokerError::Rejected {
                reason: "unused".to_string(),
            })
        }

        async fn get_candles(&self, _: &str, _: Timeframe, _: u32) -> Result<Vec<Candle>> {
            Err(BrokerError::Rejected {
                reason: "unused".to_string(),
            })
        }

        async fn get_account_balance(&self) -> Result<f64> {
            self.next()
        }
    }

    fn wrap(inner: Arc<FlakyGateway>, max_trials: u32) -> RetryingGateway {
        RetryingGateway::new(
            inner,
            max_trials.try_into().expect("not zero"),
            time::Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let inner = Arc::new(FlakyGateway::transient(2));
        let gateway = wrap(inner.clone(), 3);

        let balance = gateway.get_account_balance().await.unwrap();

        assert_eq!(balance, 10_000.0);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_surfaces_typed_error() {
        let inner = Arc::new(FlakyGateway::transient(5));
        let gateway = wrap(inner.clone(), 3);

        let err = gateway.get_account_balance().await.unwrap_err();

        match err {
            BrokerError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(last.is_transient());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejections_are_not_retried() {
        let inner = Arc::new(FlakyGateway::rejecting());
        let gateway = wrap(inner.clone(), 3);

        let err = gateway.get_account_balance().await.unwrap_err();

        assert!(matches!(err, BrokerError::Rejected { .. }));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
