//! InMemoryTelemetryStore - 開発・テスト用の TelemetryStore
//!
//! 挿入順の Vec を Mutex で守るだけの実装。
//! JsonlTelemetryStore もこれをインデックスとして使う。

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{GatewayError, RecordId, TelemetryAggregate, TelemetryRecord};
use crate::ports::TelemetryStore;

#[derive(Default)]
pub struct InMemoryTelemetryStore {
    records: Mutex<Vec<TelemetryRecord>>,
}

impl InMemoryTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// 既存の記録をまとめて読み込む（起動時のリプレイ用）
    pub(crate) async fn load(&self, records: Vec<TelemetryRecord>) {
        let mut guard = self.records.lock().await;
        guard.clear();
        guard.extend(records);
    }
}

/// timestamp 降順、同時刻は挿入の新しい順で最大 `limit` 件
pub(crate) fn newest_first(records: &[TelemetryRecord], limit: usize) -> Vec<TelemetryRecord> {
    let mut sorted: Vec<&TelemetryRecord> = records.iter().rev().collect();
    // stable sort なので同時刻は逆挿入順のまま残る
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted.into_iter().take(limit).cloned().collect()
}

#[async_trait]
impl TelemetryStore for InMemoryTelemetryStore {
    async fn initialize(&self) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn insert(&self, record: TelemetryRecord) -> Result<RecordId, GatewayError> {
        let id = record.id;
        self.records.lock().await.push(record);
        Ok(id)
    }

    async fn latest(&self, limit: usize) -> Result<Vec<TelemetryRecord>, GatewayError> {
        let guard = self.records.lock().await;
        Ok(newest_first(&guard, limit))
    }

    async fn aggregate(&self) -> Result<Option<TelemetryAggregate>, GatewayError> {
        let guard = self.records.lock().await;
        Ok(TelemetryAggregate::from_records(guard.iter()))
    }
}
