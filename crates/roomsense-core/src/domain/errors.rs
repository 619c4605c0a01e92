//! Errors - エラー型と分類
//!
//! ゲートウェイの全操作はこの `GatewayError` を返します。
//! HTTP 層は `ErrorKind` を見てステータスコードを決めます。

use thiserror::Error;

/// ErrorKind は運用上の分類
///
/// - Client: リクエスト内容の問題（400。サイズ超過も含む）
/// - Auth: 認証失敗（401）
/// - Throttled: レート制限（429）
/// - Missing: 対象データなし（404）
/// - Infrastructure: ファイルシステムや永続化層の障害（500）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Client,
    Auth,
    Throttled,
    Missing,
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// 不正・未登録の credential、またはクラス違い。
    /// 両者は呼び出し側に区別させない。
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("image exceeds {limit} bytes (got {actual})")]
    PayloadTooLarge { limit: usize, actual: usize },

    #[error("invalid image data: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("store unavailable: {0}")]
    Upstream(String),

    #[error("{0}")]
    NotFound(String),

    #[error("no telemetry data")]
    NoData,

    #[error("rate limit exceeded: {limit} per {window_secs}s")]
    RateLimited { limit: u32, window_secs: u64 },
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Unauthorized => ErrorKind::Auth,
            GatewayError::Validation(_)
            | GatewayError::PayloadTooLarge { .. }
            | GatewayError::Decode(_) => ErrorKind::Client,
            GatewayError::RateLimited { .. } => ErrorKind::Throttled,
            GatewayError::NotFound(_) | GatewayError::NoData => ErrorKind::Missing,
            GatewayError::Storage(_) | GatewayError::Upstream(_) => ErrorKind::Infrastructure,
        }
    }

    /// ファイル操作の失敗を対象パス付きで包む
    pub fn storage(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        GatewayError::Storage(format!("{context}: {err}"))
    }
}
