//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryTelemetryStore**: 開発・テスト用の記録ストア
//! - **JsonlTelemetryStore**: 追記専用ファイルの記録ストア（本番用）
//! - **LocalMediaDirectory**: ファイルシステム上の画像ディレクトリ（本番用）
//! - **InMemoryMediaDirectory**: 作成時刻を制御できるテスト用ディレクトリ

pub mod inmem_media;
pub mod inmem_telemetry;
pub mod jsonl_telemetry;
pub mod local_media;

pub use self::inmem_media::InMemoryMediaDirectory;
pub use self::inmem_telemetry::InMemoryTelemetryStore;
pub use self::jsonl_telemetry::JsonlTelemetryStore;
pub use self::local_media::LocalMediaDirectory;
