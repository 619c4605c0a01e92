//! Backup - 起動時の画像ディレクトリのスナップショット
//!
//! `backup_root/backup_<YYYYMMDD_HHMMSS_ffffff>` にディレクトリごと複製する。
//! 元のディレクトリが無ければ warn を出して何もしない。

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{info, warn};

use crate::domain::GatewayError;

const BACKUP_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

pub fn backup_dir_name(at: DateTime<Utc>) -> String {
    format!("backup_{}", at.format(BACKUP_STAMP_FORMAT))
}

/// 作成したスナップショットのパスを返す。元が無ければ `None`。
pub async fn snapshot_media(
    source: &Path,
    backup_root: &Path,
    at: DateTime<Utc>,
) -> Result<Option<PathBuf>, GatewayError> {
    if !fs::try_exists(source)
        .await
        .map_err(|e| GatewayError::storage(source.display(), e))?
    {
        warn!(source = %source.display(), "media directory not found, skipping backup");
        return Ok(None);
    }

    let target = backup_root.join(backup_dir_name(at));
    let copied = copy_tree(source, &target).await?;
    info!(target = %target.display(), files = copied, "media backup created");
    Ok(Some(target))
}

/// 再帰コピー（スタックで辿る）。コピーしたファイル数を返す。
async fn copy_tree(source: &Path, target: &Path) -> Result<usize, GatewayError> {
    let mut copied = 0;
    let mut pending = vec![(source.to_path_buf(), target.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        fs::create_dir_all(&to)
            .await
            .map_err(|e| GatewayError::storage(to.display(), e))?;

        let mut dir = fs::read_dir(&from)
            .await
            .map_err(|e| GatewayError::storage(from.display(), e))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| GatewayError::storage(from.display(), e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| GatewayError::storage(entry.path().display(), e))?;
            let dest = to.join(entry.file_name());
            if file_type.is_dir() {
                pending.push((entry.path(), dest));
            } else if file_type.is_file() {
                fs::copy(entry.path(), &dest)
                    .await
                    .map_err(|e| GatewayError::storage(entry.path().display(), e))?;
                copied += 1;
            }
        }
    }
    Ok(copied)
}
