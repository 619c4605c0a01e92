//! HTTP - axum によるエンドポイント
//!
//! # エンドポイント
//! | パス | 旧パス（デバイスのファームウェア用） |
//! |---|---|
//! | `POST /telemetry` | `POST /api/sensor` |
//! | `GET /telemetry/latest` | `GET /api/sensor/latest` |
//! | `GET /telemetry/aggregate` | `GET /api/sensor/aggregate` |
//! | `POST /media` | `POST /upload` |
//! | `GET /media/latest` | `GET /api/camera/latest` |
//! | `POST /media/cleanup` | `POST /api/camera/cleanup` |

pub mod error;
pub mod handlers;
mod routes;

pub use self::error::ApiError;
pub use self::handlers::{API_KEY_HEADER, GatewayState};
pub use self::routes::router;
