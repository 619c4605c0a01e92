//! MediaStorageManager - 画像ディレクトリの容量管理
//!
//! # ヒステリシス
//! - 合計サイズが上限を超えたときだけ動く
//! - 動いたら目標値（上限 × ratio）以下になるまで古い順に削除する
//! - 上限ちょうどは超過ではない
//!
//! # 並行性
//! 読み取り → 削除 → 書き込みの間にロックは取らない。並行アップロード中は
//! 一時的に上限を超えうる。

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::{GatewayError, MediaEntry};
use crate::ports::MediaDirectory;

const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoragePolicy {
    pub cap_bytes: u64,
    /// 0 < ratio <= 1
    pub target_ratio: f64,
}

impl StoragePolicy {
    pub fn from_megabytes(cap_mb: u64, target_ratio: f64) -> Self {
        Self {
            cap_bytes: cap_mb.saturating_mul(BYTES_PER_MEGABYTE),
            target_ratio,
        }
    }

    pub fn target_bytes(&self) -> u64 {
        (self.cap_bytes as f64 * self.target_ratio) as u64
    }
}

impl Default for StoragePolicy {
    fn default() -> Self {
        Self::from_megabytes(100, 0.8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictedFile {
    pub name: String,
    pub size: u64,
    /// この削除後の合計（スキャン時のサイズで差し引いた値）
    pub total_after: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalFailure {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub total_before: u64,
    pub total_after: u64,
    pub evicted: Vec<EvictedFile>,
    pub failures: Vec<RemovalFailure>,
}

pub struct MediaStorageManager {
    dir: Arc<dyn MediaDirectory>,
    policy: StoragePolicy,
}

impl MediaStorageManager {
    pub fn new(dir: Arc<dyn MediaDirectory>, policy: StoragePolicy) -> Self {
        Self { dir, policy }
    }

    /// 上限を超えていれば古い順に削除する。
    ///
    /// 個々の削除失敗はログに残して次のファイルへ進む。失敗したファイルの分は
    /// 合計から差し引かないので、結果として目標値を上回ったまま終わることもある。
    pub async fn enforce_capacity(&self) -> Result<EvictionReport, GatewayError> {
        let mut entries = self.dir.list().await?;
        let total_before: u64 = entries.iter().map(|e| e.size).sum();
        let mut report = EvictionReport {
            total_before,
            total_after: total_before,
            ..EvictionReport::default()
        };

        if total_before <= self.policy.cap_bytes {
            return Ok(report);
        }

        let target = self.policy.target_bytes();
        warn!(
            total_bytes = total_before,
            cap_bytes = self.policy.cap_bytes,
            target_bytes = target,
            "media storage over capacity, evicting oldest files"
        );

        sort_oldest_first(&mut entries);

        let mut total = total_before;
        for entry in entries {
            if total <= target {
                break;
            }
            match self.dir.remove(&entry.name).await {
                Ok(()) => {
                    total = total.saturating_sub(entry.size);
                    info!(
                        file = %entry.name,
                        size = entry.size,
                        total_bytes = total,
                        "evicted media file"
                    );
                    report.evicted.push(EvictedFile {
                        name: entry.name,
                        size: entry.size,
                        total_after: total,
                    });
                }
                Err(e) => {
                    error!(file = %entry.name, error = %e, "failed to evict media file");
                    report.failures.push(RemovalFailure {
                        name: entry.name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.total_after = total;
        Ok(report)
    }
}

/// 作成時刻の昇順、同時刻は名前順
fn sort_oldest_first(entries: &mut [MediaEntry]) {
    entries.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.name.cmp(&b.name)));
}
