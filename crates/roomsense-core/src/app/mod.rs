//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **GatewayBuilder / Gateway**: 構築とワイヤリング、リクエスト処理のコンテキスト
//! - **AuthGate**: credential と DeviceClass の照合
//! - **RateLimiter**: 画像アップロードの流量制限
//! - **TelemetryIngest / TelemetryQuery**: センサー記録の保存と参照
//! - **MediaIngest / MediaQuery / MediaCleanup**: 画像の保存・参照・全削除
//! - **MediaStorageManager**: 容量上限と古い順の削除
//! - **backup**: 起動時のスナップショット

pub mod auth;
pub mod backup;
pub mod builder;
pub mod media_cleanup;
pub mod media_ingest;
pub mod media_query;
pub mod rate_limit;
pub mod storage_manager;
pub mod telemetry_ingest;
pub mod telemetry_query;

// 主要な型を再エクスポート
pub use self::auth::{AuthGate, DeviceRegistry, RegistryError};
pub use self::backup::snapshot_media;
pub use self::builder::{BootstrapError, BuildError, Gateway, GatewayBuilder, bootstrap};
pub use self::media_cleanup::{CleanupReport, MediaCleanup};
pub use self::media_ingest::{MediaIngest, UploadPolicy};
pub use self::media_query::MediaQuery;
pub use self::rate_limit::{RateLimit, RateLimiter};
pub use self::storage_manager::{EvictionReport, MediaStorageManager, StoragePolicy};
pub use self::telemetry_ingest::TelemetryIngest;
pub use self::telemetry_query::TelemetryQuery;
