//! TelemetryIngest - センサー読み取り値の検証と保存
//!
//! # フロー
//! 1. 必須フィールドの存在確認（値の型は見ない）
//! 2. サーバ時刻と device_type を付与
//! 3. ストアへ 1 回だけ insert（リトライしない。再送されれば重複しうる）

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::domain::{GatewayError, RecordId, SENSOR_DEVICE_TYPE, TelemetryReading, TelemetryRecord};
use crate::ports::{Clock, IdGenerator, TelemetryStore};

pub struct TelemetryIngest {
    store: Arc<dyn TelemetryStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl TelemetryIngest {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self { store, clock, ids }
    }

    pub async fn ingest(&self, payload: Value) -> Result<RecordId, GatewayError> {
        let reading = TelemetryReading::from_json(payload)?;
        let record = TelemetryRecord {
            id: self.ids.generate_record_id(),
            reading,
            timestamp: self.clock.now(),
            device_type: SENSOR_DEVICE_TYPE.to_string(),
        };

        let id = self.store.insert(record).await?;
        info!(record_id = %id, "telemetry record stored");
        Ok(id)
    }

    /// リクエストボディ（JSON バイト列）から取り込む
    pub async fn ingest_json(&self, body: &[u8]) -> Result<RecordId, GatewayError> {
        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::Validation(format!("invalid JSON body: {e}")))?;
        self.ingest(payload).await
    }
}
