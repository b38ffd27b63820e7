use async_trait::async_trait;

use super::{
    error::Result,
    models::{RiskStateRow, TrackedPositionRow},
};

#[async_trait]
pub(crate) trait PositionsRepository: Send + Sync {
    /// Inserts or fully replaces the row for `row.trade_id`.
    async fn upsert(&self, row: &TrackedPositionRow) -> Result<()>;

    async fn remove(&self, trade_id: &str) -> Result<()>;

    async fn load_all(&self) -> Result<Vec<TrackedPositionRow>>;
}

#[async_trait]
pub(crate) trait RiskStateRepository: Send + Sync {
    /// Replaces the single risk-state snapshot row.
    async fn save(&self, row: &RiskStateRow) -> Result<()>;

    async fn load(&self) -> Result<Option<RiskStateRow>>;
}
