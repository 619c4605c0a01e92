//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（ドキュメントストア、ファイルシステム、時刻）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod id_generator;
pub mod media_directory;
pub mod telemetry_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::media_directory::MediaDirectory;
pub use self::telemetry_store::TelemetryStore;
