use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    broker::{Candle, OrderGateway},
    shared::Timeframe,
};

pub mod error;

use error::{MarketError, Result};

/// A validated window of completed price bars for one instrument and timeframe.
///
/// Construction filters out incomplete bars and rejects windows below the configured
/// minimum bar count, so downstream analysis can assume a clean chronological series.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    instrument: String,
    timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl MarketSnapshot {
    pub fn from_candles(
        instrument: impl Into<String>,
        timeframe: Timeframe,
        candles: Vec<Candle>,
        min_bars: usize,
    ) -> Result<Self> {
        let complete: Vec<Candle> = candles.into_iter().filter(|c| c.complete).collect();

        // A snapshot is never empty; `latest` relies on that.
        let need = min_bars.max(1);
        if complete.len() < need {
            return Err(MarketError::NotEnoughBars {
                have: complete.len(),
                need,
            });
        }

        Ok(Self {
            instrument: instrument.into(),
            timeframe,
            candles: complete,
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Completed bars, ordered chronologically with the most recent last.
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn latest(&self) -> &Candle {
        self.candles.last().expect("snapshot is never empty")
    }
}

/// Boundary supplying market snapshots for scans.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn snapshot(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: u32,
        min_bars: usize,
    ) -> Result<MarketSnapshot>;
}

/// Default provider sourcing candles from the order gateway's candle endpoint.
pub struct GatewaySnapshotProvider {
    gateway: Arc<dyn OrderGateway>,
}

impl GatewaySnapshotProvider {
    pub fn new(gateway: Arc<dyn OrderGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl SnapshotProvider for GatewaySnapshotProvider {
    async fn snapshot(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: u32,
        min_bars: usize,
    ) -> Result<MarketSnapshot> {
        let candles = self.gateway.get_candles(instrument, timeframe, count).await?;

        MarketSnapshot::from_candles(instrument, timeframe, candles, min_bars)
    }
}
