//! MediaQuery - 最新画像の取得
//!
//! 「最新」は命名規則に合うファイル名の辞書順最大。作成時刻は見ない。

use std::sync::Arc;

use crate::domain::{GatewayError, LatestImage, MediaFileName};
use crate::ports::MediaDirectory;

pub struct MediaQuery {
    dir: Arc<dyn MediaDirectory>,
}

impl MediaQuery {
    pub fn new(dir: Arc<dyn MediaDirectory>) -> Self {
        Self { dir }
    }

    pub async fn latest(&self) -> Result<LatestImage, GatewayError> {
        let newest = self
            .dir
            .list()
            .await?
            .iter()
            .filter_map(|entry| MediaFileName::parse(&entry.name))
            .max()
            .ok_or_else(|| GatewayError::NotFound("No images found".to_string()))?;

        let bytes = self.dir.read(newest.as_str()).await?;
        Ok(LatestImage {
            filename: newest,
            bytes,
        })
    }
}
