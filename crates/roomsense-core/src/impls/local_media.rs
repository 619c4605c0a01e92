//! LocalMediaDirectory - ファイルシステム上の画像ディレクトリ
//!
//! 作成時刻はファイルシステムが報告する birth time を使い、
//! 取得できないプラットフォームでは更新時刻で代用する。

use std::path::PathBuf;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::debug;

use crate::domain::{GatewayError, MediaEntry};
use crate::ports::MediaDirectory;

#[derive(Debug, Clone)]
pub struct LocalMediaDirectory {
    root: PathBuf,
}

impl LocalMediaDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// ディレクトリが無ければ作る
    pub async fn ensure_exists(&self) -> Result<(), GatewayError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| GatewayError::storage(self.root.display(), e))
    }

    /// ディレクトリの外を指す名前は受け付けない
    fn path_for(&self, name: &str) -> Result<PathBuf, GatewayError> {
        let is_plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !is_plain {
            return Err(GatewayError::Storage(format!("invalid media file name: {name:?}")));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl MediaDirectory for LocalMediaDirectory {
    async fn list(&self) -> Result<Vec<MediaEntry>, GatewayError> {
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| GatewayError::storage(self.root.display(), e))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| GatewayError::storage(self.root.display(), e))?
        {
            // 列挙と stat の間に消えたファイルは無視する
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!(path = %entry.path().display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push(MediaEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                created: DateTime::<Utc>::from(created),
            });
        }
        Ok(entries)
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> Result<u64, GatewayError> {
        let path = self.path_for(name)?;
        fs::write(&path, bytes)
            .await
            .map_err(|e| GatewayError::storage(path.display(), e))?;
        Ok(bytes.len() as u64)
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, GatewayError> {
        let path = self.path_for(name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(GatewayError::NotFound(format!("{name} not found")))
            }
            Err(e) => Err(GatewayError::storage(path.display(), e)),
        }
    }

    async fn remove(&self, name: &str) -> Result<(), GatewayError> {
        let path = self.path_for(name)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| GatewayError::storage(path.display(), e))
    }
}
