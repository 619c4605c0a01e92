//! Media - カメラ画像のファイル名規則と資産表現
//!
//! ファイル名は `esp32cam_<YYYYMMDD_HHMMSS>.jpg`（UTC、秒精度）。
//!
//! # 既知の制約
//! - 同じ秒に 2 枚アップロードされると同名になり、後勝ちで上書きされる
//! - 「最新」はファイル名の辞書順最大で決める。1 秒に 1 枚以下なら時系列順と一致する

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

pub const FILE_PREFIX: &str = "esp32cam_";
pub const FILE_SUFFIX: &str = ".jpg";
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A filename following the upload naming convention.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MediaFileName(String);

impl MediaFileName {
    pub fn for_instant(at: DateTime<Utc>) -> Self {
        Self(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", at.format(STAMP_FORMAT)))
    }

    /// 命名規則に合うファイル名だけを受け付ける
    pub fn parse(name: &str) -> Option<Self> {
        if name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX) {
            Some(Self(name.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `YYYYMMDD_HHMMSS` 部分
    pub fn stamp(&self) -> &str {
        &self.0[FILE_PREFIX.len()..self.0.len() - FILE_SUFFIX.len()]
    }
}

impl fmt::Display for MediaFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file as seen by a directory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    pub name: String,
    pub size: u64,
    /// Filesystem-reported creation time; the eviction key.
    pub created: DateTime<Utc>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaAsset {
    pub filename: MediaFileName,
    pub size: u64,
}

impl MediaAsset {
    /// `12.34KB` 形式のサイズ表記
    pub fn size_label(&self) -> String {
        format!("{:.2}KB", self.size as f64 / 1024.0)
    }
}

impl Serialize for MediaFileName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// The newest stored image with its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestImage {
    pub filename: MediaFileName,
    pub bytes: Vec<u8>,
}

impl LatestImage {
    pub fn timestamp(&self) -> &str {
        self.filename.stamp()
    }
}
