//! GatewayConfig - figment による設定の読み込み
//!
//! 優先順位（後勝ち）:
//! 1. 組み込みのデフォルト
//! 2. TOML ファイル（指定された場合）
//! 3. `ROOMSENSE_` で始まる環境変数。ネストは `__` で区切る
//!    （例: `ROOMSENSE_MEDIA__MAX_STORAGE_MB=50`）

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::app::{RateLimit, StoragePolicy, UploadPolicy};
use crate::domain::DeviceClass;

pub const ENV_PREFIX: &str = "ROOMSENSE_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] figment::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub media: MediaConfig,
    pub telemetry: TelemetryConfig,
    pub rate_limit: RateLimitConfig,
    pub backup: BackupConfig,
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5001)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub dir: PathBuf,
    pub max_storage_mb: u64,
    pub eviction_target_ratio: f64,
    pub max_upload_bytes: usize,
    pub jpeg_quality: u8,
}

impl Default for MediaConfig {
    fn default() -> Self {
        let upload = UploadPolicy::default();
        Self {
            dir: PathBuf::from("static/uploads"),
            max_storage_mb: 100,
            eviction_target_ratio: 0.8,
            max_upload_bytes: upload.max_upload_bytes,
            jpeg_quality: upload.jpeg_quality,
        }
    }
}

impl MediaConfig {
    pub fn storage_policy(&self) -> StoragePolicy {
        StoragePolicy::from_megabytes(self.max_storage_mb, self.eviction_target_ratio)
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_upload_bytes: self.max_upload_bytes,
            jpeg_quality: self.jpeg_quality,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// JSON Lines ファイル。未指定ならメモリ上のストア（再起動で消える）
    pub path: Option<PathBuf>,
    pub latest_limit: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            path: None,
            latest_limit: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub upload_max_requests: u32,
    pub upload_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            upload_max_requests: 5,
            upload_window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn upload_limit(&self) -> RateLimit {
        RateLimit {
            max_requests: self.upload_max_requests,
            window: std::time::Duration::from_secs(self.upload_window_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub enabled: bool,
    pub root: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: PathBuf::from("static/backups"),
        }
    }
}

/// credential と DeviceClass の対応 1 件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub key: String,
    pub class: DeviceClass,
}

impl GatewayConfig {
    /// デフォルト → TOML → 環境変数の順に重ねる
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(GatewayConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// 読み込みと検証をまとめて行う
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config: GatewayConfig = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return invalid(format!(
                "logging.level '{}' must be one of: {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ));
        }

        let ratio = self.media.eviction_target_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return invalid(format!(
                "media.eviction_target_ratio {ratio} must be in (0, 1]"
            ));
        }
        if self.media.max_storage_mb == 0 {
            return invalid("media.max_storage_mb must be greater than 0".to_string());
        }
        if self.media.max_upload_bytes == 0 {
            return invalid("media.max_upload_bytes must be greater than 0".to_string());
        }
        if !(1..=100).contains(&self.media.jpeg_quality) {
            return invalid(format!(
                "media.jpeg_quality {} must be 1-100",
                self.media.jpeg_quality
            ));
        }

        if self.rate_limit.upload_max_requests == 0 || self.rate_limit.upload_window_secs == 0 {
            return invalid("rate_limit quota and window must be greater than 0".to_string());
        }

        let mut keys = HashSet::new();
        for device in &self.devices {
            if !keys.insert(device.key.as_str()) {
                return invalid(format!("duplicate device key for class {}", device.class));
            }
        }

        Ok(())
    }
}
