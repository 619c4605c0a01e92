//! TelemetryQuery - 最新記録の取得と全体集計

use std::sync::Arc;

use crate::domain::{GatewayError, RecordView, TelemetryAggregate};
use crate::ports::TelemetryStore;

pub struct TelemetryQuery {
    store: Arc<dyn TelemetryStore>,
}

impl TelemetryQuery {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self { store }
    }

    /// 最大 `n` 件、timestamp の降順
    pub async fn latest(&self, n: usize) -> Result<Vec<RecordView>, GatewayError> {
        let records = self.store.latest(n).await?;
        Ok(records.iter().map(RecordView::from).collect())
    }

    /// コレクション全体の集計。記録が無ければ `GatewayError::NoData`。
    pub async fn aggregate(&self) -> Result<TelemetryAggregate, GatewayError> {
        self.store.aggregate().await?.ok_or(GatewayError::NoData)
    }
}
