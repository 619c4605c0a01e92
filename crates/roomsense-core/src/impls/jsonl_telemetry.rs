//! JsonlTelemetryStore - 追記専用ファイルによる TelemetryStore
//!
//! 1 行 1 レコードの JSON Lines。起動時に全行を読み込んでメモリ上の
//! インデックスを再構築し、以後は追記 + インデックス更新を行う。
//!
//! # 障害時の扱い
//! - 壊れた行は warn を出して読み飛ばす（途中で落ちた書き込みの残骸）
//! - 書き込み失敗は `GatewayError::Upstream`。インデックスには反映しない
//! - 失敗した書き込みは行の断片を残しうるので、次のレコードは改行から始める

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::inmem_telemetry::InMemoryTelemetryStore;
use crate::domain::{GatewayError, RecordId, TelemetryAggregate, TelemetryRecord};
use crate::ports::TelemetryStore;

pub struct JsonlTelemetryStore {
    path: PathBuf,
    writer: Mutex<Option<Appender>>,
    index: InMemoryTelemetryStore,
}

struct Appender {
    file: File,
    /// 末尾が改行で終わっていない可能性がある
    torn: bool,
}

impl JsonlTelemetryStore {
    /// `initialize` を呼ぶまでファイルには触れない
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(None),
            index: InMemoryTelemetryStore::new(),
        }
    }

    fn upstream(&self, action: &str, err: impl std::fmt::Display) -> GatewayError {
        GatewayError::Upstream(format!("{action} {}: {err}", self.path.display()))
    }
}

#[async_trait]
impl TelemetryStore for JsonlTelemetryStore {
    async fn initialize(&self) -> Result<(), GatewayError> {
        let mut writer = self.writer.lock().await;
        if writer.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.upstream("create directory for", e))?;
        }

        let existing = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(self.upstream("read", e)),
        };

        let mut records = Vec::new();
        for (line_no, line) in existing.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TelemetryRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = line_no + 1,
                    error = %e,
                    "skipping unreadable telemetry line"
                ),
            }
        }
        info!(path = %self.path.display(), records = records.len(), "telemetry store loaded");
        self.index.load(records).await;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.upstream("open", e))?;
        *writer = Some(Appender {
            file,
            torn: !existing.is_empty() && !existing.ends_with('\n'),
        });
        Ok(())
    }

    async fn insert(&self, record: TelemetryRecord) -> Result<RecordId, GatewayError> {
        let encoded =
            serde_json::to_vec(&record).map_err(|e| self.upstream("encode record for", e))?;

        let mut writer = self.writer.lock().await;
        let appender = writer
            .as_mut()
            .ok_or_else(|| self.upstream("write", "store not initialized"))?;

        // 断片の後ろに繋がると両方とも読めない行になる
        let mut line = Vec::with_capacity(encoded.len() + 2);
        if appender.torn {
            line.push(b'\n');
        }
        line.extend_from_slice(&encoded);
        line.push(b'\n');

        if let Err(e) = appender.file.write_all(&line).await {
            appender.torn = true;
            return Err(self.upstream("append to", e));
        }
        if let Err(e) = appender.file.sync_data().await {
            appender.torn = true;
            return Err(self.upstream("sync", e));
        }
        appender.torn = false;

        // ロックを持ったままインデックスに入れて、ファイル順と挿入順を揃える
        let id = self.index.insert(record).await?;
        drop(writer);
        Ok(id)
    }

    async fn latest(&self, limit: usize) -> Result<Vec<TelemetryRecord>, GatewayError> {
        self.index.latest(limit).await
    }

    async fn aggregate(&self) -> Result<Option<TelemetryAggregate>, GatewayError> {
        self.index.aggregate().await
    }
}
