//! GatewayBuilder - ゲートウェイの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - expect_classes() で提供する DeviceClass を宣言（デフォルトは sensor と camera の両方）
//! - build() 時に「期待集合 ⊆ 登録済み credential のクラス集合」をチェック
//! - 不足があれば BuildError を返す。誰も使えないエンドポイントを起動しない
//!
//! 構築結果の `Gateway` がリクエスト処理に必要なものを全て持つ。
//! グローバルな可変状態は持たない。

use std::collections::HashSet;
use std::sync::Arc;

use super::auth::{AuthGate, DeviceRegistry, RegistryError};
use super::media_cleanup::MediaCleanup;
use super::media_ingest::{MediaIngest, UploadPolicy};
use super::media_query::MediaQuery;
use super::rate_limit::{RateLimit, RateLimiter};
use super::storage_manager::{MediaStorageManager, StoragePolicy};
use super::telemetry_ingest::TelemetryIngest;
use super::telemetry_query::TelemetryQuery;
use crate::config::GatewayConfig;
use crate::domain::{DeviceClass, GatewayError};
use crate::impls::{InMemoryTelemetryStore, JsonlTelemetryStore, LocalMediaDirectory};
use crate::ports::{Clock, IdGenerator, MediaDirectory, SystemClock, TelemetryStore, UlidGenerator};

pub const DEFAULT_LATEST_LIMIT: usize = 10;

/// BuildError はゲートウェイ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing device classes: {0:?}. No credential is registered for these classes.")]
    MissingDeviceClasses(Vec<DeviceClass>),

    #[error("telemetry store is not configured")]
    MissingTelemetryStore,

    #[error("media directory is not configured")]
    MissingMediaDirectory,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// 起動処理全体のエラー
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("startup failed: {0}")]
    Startup(#[from] GatewayError),
}

/// # 使用例
/// ```ignore
/// let gateway = GatewayBuilder::new()
///     .register_device("sensor-key", DeviceClass::Sensor)?
///     .register_device("camera-key", DeviceClass::Camera)?
///     .telemetry_store(Arc::new(InMemoryTelemetryStore::new()))
///     .media_directory(Arc::new(LocalMediaDirectory::new("static/uploads")))
///     .build()?;
/// ```
pub struct GatewayBuilder {
    registry: DeviceRegistry,
    telemetry_store: Option<Arc<dyn TelemetryStore>>,
    media_directory: Option<Arc<dyn MediaDirectory>>,
    clock: Arc<dyn Clock>,
    ids: Option<Arc<dyn IdGenerator>>,
    storage_policy: StoragePolicy,
    upload_policy: UploadPolicy,
    rate_limit: RateLimit,
    latest_limit: usize,
    expected_classes: Option<Vec<DeviceClass>>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            registry: DeviceRegistry::new(),
            telemetry_store: None,
            media_directory: None,
            clock: Arc::new(SystemClock),
            ids: None,
            storage_policy: StoragePolicy::default(),
            upload_policy: UploadPolicy::default(),
            rate_limit: RateLimit::per_minute(5),
            latest_limit: DEFAULT_LATEST_LIMIT,
            expected_classes: Some(DeviceClass::ALL.to_vec()),
        }
    }

    /// 設定からポリシーと credential を取り込む。ストアとディレクトリも設定どおりに作る。
    pub fn from_config(config: &GatewayConfig) -> Result<Self, BuildError> {
        let telemetry_store: Arc<dyn TelemetryStore> = match &config.telemetry.path {
            Some(path) => Arc::new(JsonlTelemetryStore::new(path)),
            None => Arc::new(InMemoryTelemetryStore::new()),
        };

        let mut builder = Self::new()
            .telemetry_store(telemetry_store)
            .media_directory(Arc::new(LocalMediaDirectory::new(&config.media.dir)))
            .storage_policy(config.media.storage_policy())
            .upload_policy(config.media.upload_policy())
            .rate_limit(config.rate_limit.upload_limit())
            .latest_limit(config.telemetry.latest_limit);
        for device in &config.devices {
            builder = builder.register_device(device.key.clone(), device.class)?;
        }
        Ok(builder)
    }

    pub fn register_device(
        mut self,
        credential: impl Into<String>,
        class: DeviceClass,
    ) -> Result<Self, RegistryError> {
        self.registry.register(credential, class)?;
        Ok(self)
    }

    pub fn telemetry_store(mut self, store: Arc<dyn TelemetryStore>) -> Self {
        self.telemetry_store = Some(store);
        self
    }

    pub fn media_directory(mut self, dir: Arc<dyn MediaDirectory>) -> Self {
        self.media_directory = Some(dir);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 未指定なら clock を使う ULID 生成器
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn storage_policy(mut self, policy: StoragePolicy) -> Self {
        self.storage_policy = policy;
        self
    }

    pub fn upload_policy(mut self, policy: UploadPolicy) -> Self {
        self.upload_policy = policy;
        self
    }

    pub fn rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = limit;
        self
    }

    pub fn latest_limit(mut self, limit: usize) -> Self {
        self.latest_limit = limit;
        self
    }

    /// credential が必要な DeviceClass を宣言する（空なら検証しない）
    pub fn expect_classes(mut self, classes: &[DeviceClass]) -> Self {
        self.expected_classes = Some(classes.to_vec());
        self
    }

    pub fn build(self) -> Result<Gateway, BuildError> {
        if let Some(expected) = &self.expected_classes {
            let registered: HashSet<DeviceClass> = self.registry.classes();
            let missing: Vec<DeviceClass> = expected
                .iter()
                .filter(|class| !registered.contains(*class))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingDeviceClasses(missing));
            }
        }

        let telemetry_store = self
            .telemetry_store
            .ok_or(BuildError::MissingTelemetryStore)?;
        let media_directory = self
            .media_directory
            .ok_or(BuildError::MissingMediaDirectory)?;
        let clock = self.clock;
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(clock.clone())),
        };

        let storage = Arc::new(MediaStorageManager::new(
            media_directory.clone(),
            self.storage_policy,
        ));

        Ok(Gateway {
            auth: AuthGate::new(Arc::new(self.registry)),
            upload_limiter: RateLimiter::new(self.rate_limit),
            telemetry_ingest: TelemetryIngest::new(telemetry_store.clone(), clock.clone(), ids),
            telemetry_query: TelemetryQuery::new(telemetry_store.clone()),
            media_ingest: MediaIngest::new(
                media_directory.clone(),
                storage,
                clock,
                self.upload_policy,
            ),
            media_query: MediaQuery::new(media_directory.clone()),
            media_cleanup: MediaCleanup::new(media_directory),
            telemetry_store,
            latest_limit: self.latest_limit,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Gateway はリクエスト処理のコンテキスト
pub struct Gateway {
    pub auth: AuthGate,
    pub upload_limiter: RateLimiter,
    pub telemetry_ingest: TelemetryIngest,
    pub telemetry_query: TelemetryQuery,
    pub media_ingest: MediaIngest,
    pub media_query: MediaQuery,
    pub media_cleanup: MediaCleanup,
    pub latest_limit: usize,
    telemetry_store: Arc<dyn TelemetryStore>,
}

impl Gateway {
    /// ストアの初期化。起動時に 1 回呼ぶ。
    pub async fn initialize(&self) -> Result<(), GatewayError> {
        self.telemetry_store.initialize().await
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.media_ingest.policy().max_upload_bytes
    }
}

/// 設定からゲートウェイを組み立て、画像ディレクトリとストアを準備する
pub async fn bootstrap(config: &GatewayConfig) -> Result<Gateway, BootstrapError> {
    LocalMediaDirectory::new(&config.media.dir)
        .ensure_exists()
        .await?;
    let gateway = GatewayBuilder::from_config(config)?.build()?;
    gateway.initialize().await?;
    Ok(gateway)
}
