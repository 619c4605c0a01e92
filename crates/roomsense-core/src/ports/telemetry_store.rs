//! TelemetryStore port - テレメトリ記録の永続化
//!
//! ドキュメントストアを「追記専用の配列 + ソート + 集計」として扱う。
//!
//! # 実装
//! - `InMemoryTelemetryStore`: 開発・テスト用
//! - `JsonlTelemetryStore`: 追記専用ファイル（本番用）

use async_trait::async_trait;

use crate::domain::{GatewayError, RecordId, TelemetryAggregate, TelemetryRecord};

/// TelemetryStore は記録を追記し、新しい順に返し、全件を集計する
///
/// # 設計原則
/// - insert は 1 レコード単位でアトミック
/// - 記録は書き込み後に変更・削除されない
/// - 到達不能などの障害は `GatewayError::Upstream`
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// 起動時に一度だけ呼ぶ。保存先の準備と既存データの読み込み。
    async fn initialize(&self) -> Result<(), GatewayError>;

    async fn insert(&self, record: TelemetryRecord) -> Result<RecordId, GatewayError>;

    /// 最大 `limit` 件を timestamp の降順で返す。
    /// 同時刻の記録は後から挿入されたものが先。
    async fn latest(&self, limit: usize) -> Result<Vec<TelemetryRecord>, GatewayError>;

    /// 全件の集計。空なら `None`。
    async fn aggregate(&self) -> Result<Option<TelemetryAggregate>, GatewayError>;
}
