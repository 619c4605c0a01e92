//! MediaCleanup - 画像ディレクトリの手動全削除
//!
//! 個々の削除失敗はログに残して読み飛ばし、全体としては成功を返す。
//! 呼び出し側は `deleted` の中身でしか部分失敗を知ることができない。

use std::sync::Arc;

use tracing::{error, info};

use super::storage_manager::RemovalFailure;
use crate::domain::GatewayError;
use crate::ports::MediaDirectory;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    pub failures: Vec<RemovalFailure>,
}

impl CleanupReport {
    pub fn count(&self) -> usize {
        self.deleted.len()
    }
}

pub struct MediaCleanup {
    dir: Arc<dyn MediaDirectory>,
}

impl MediaCleanup {
    pub fn new(dir: Arc<dyn MediaDirectory>) -> Self {
        Self { dir }
    }

    /// 命名規則に関係なくディレクトリ内の全ファイルを消す
    pub async fn purge(&self) -> Result<CleanupReport, GatewayError> {
        let mut entries = self.dir.list().await?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let mut report = CleanupReport::default();
        for entry in entries {
            match self.dir.remove(&entry.name).await {
                Ok(()) => report.deleted.push(entry.name),
                Err(e) => {
                    error!(file = %entry.name, error = %e, "failed to delete media file");
                    report.failures.push(RemovalFailure {
                        name: entry.name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            deleted = report.count(),
            failed = report.failures.len(),
            "media directory purged"
        );
        Ok(report)
    }
}
