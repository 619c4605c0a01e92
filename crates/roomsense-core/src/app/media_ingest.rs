//! MediaIngest - カメラ画像の受け付けと保存
//!
//! # フロー
//! 1. 空・サイズ超過を弾く（ディレクトリには触れない）
//! 2. デコードして JPEG に再エンコード（spawn_blocking）
//! 3. 容量管理（新しい画像のサイズは勘定に入れない）
//! 4. 秒精度のタイムスタンプ名で書き込む。同じ秒の 2 枚目は上書き

use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use tokio::task::JoinError;
use tracing::info;

use super::storage_manager::MediaStorageManager;
use crate::domain::{GatewayError, MediaAsset, MediaFileName};
use crate::ports::{Clock, MediaDirectory};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_upload_bytes: usize,
    /// 1..=100
    pub jpeg_quality: u8,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

pub struct MediaIngest {
    dir: Arc<dyn MediaDirectory>,
    storage: Arc<MediaStorageManager>,
    clock: Arc<dyn Clock>,
    policy: UploadPolicy,
}

impl MediaIngest {
    pub fn new(
        dir: Arc<dyn MediaDirectory>,
        storage: Arc<MediaStorageManager>,
        clock: Arc<dyn Clock>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            dir,
            storage,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> UploadPolicy {
        self.policy
    }

    pub async fn ingest(&self, raw: Vec<u8>) -> Result<MediaAsset, GatewayError> {
        if raw.is_empty() {
            return Err(GatewayError::Validation("No image data received".to_string()));
        }
        if raw.len() > self.policy.max_upload_bytes {
            return Err(GatewayError::PayloadTooLarge {
                limit: self.policy.max_upload_bytes,
                actual: raw.len(),
            });
        }

        let quality = self.policy.jpeg_quality;
        let jpeg = tokio::task::spawn_blocking(move || reencode_jpeg(&raw, quality))
            .await
            .map_err(decoder_task_failed)??;

        self.storage.enforce_capacity().await?;

        let filename = MediaFileName::for_instant(self.clock.now());
        let size = self.dir.write(filename.as_str(), &jpeg).await?;
        info!(filename = %filename, bytes = size, "image stored");

        Ok(MediaAsset { filename, size })
    }
}

/// デコーダのタスクが落ちたのは入力ではなくサーバ側の問題
fn decoder_task_failed(err: JoinError) -> GatewayError {
    GatewayError::Storage(format!("decoder task failed: {err}"))
}

/// 任意の対応フォーマットをデコードし、RGB の JPEG にする
pub fn reencode_jpeg(raw: &[u8], quality: u8) -> Result<Vec<u8>, GatewayError> {
    let decoded = image::load_from_memory(raw)
        .map_err(|e| GatewayError::Decode(format!("Invalid image data: {e}")))?;
    let rgb = decoded.to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(|e| GatewayError::Decode(format!("failed to encode JPEG: {e}")))?;
    Ok(out)
}
