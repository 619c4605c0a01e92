//! InMemoryMediaDirectory - テスト用の画像ディレクトリ
//!
//! 作成時刻を明示して配置できるので、退避順序を決定的に検証できる。
//! 特定ファイルの削除を失敗させることもできる（権限エラーの再現）。

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{GatewayError, MediaEntry};
use crate::ports::{Clock, MediaDirectory};

struct StoredFile {
    bytes: Vec<u8>,
    created: DateTime<Utc>,
}

#[derive(Default)]
struct InMemoryMediaState {
    files: BTreeMap<String, StoredFile>,
    undeletable: HashSet<String>,
}

pub struct InMemoryMediaDirectory {
    state: Mutex<InMemoryMediaState>,
    clock: Arc<dyn Clock>,
}

impl InMemoryMediaDirectory {
    /// `write` で作られるファイルの作成時刻は `clock` から取る
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(InMemoryMediaState::default()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryMediaState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_with_created(&self, name: &str, bytes: Vec<u8>, created: DateTime<Utc>) {
        self.lock()
            .files
            .insert(name.to_string(), StoredFile { bytes, created });
    }

    /// 以後 `remove(name)` は失敗する
    pub fn fail_removal_of(&self, name: &str) {
        self.lock().undeletable.insert(name.to_string());
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    pub fn total_size(&self) -> u64 {
        self.lock().files.values().map(|f| f.bytes.len() as u64).sum()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().files.contains_key(name)
    }
}

#[async_trait]
impl MediaDirectory for InMemoryMediaDirectory {
    async fn list(&self) -> Result<Vec<MediaEntry>, GatewayError> {
        Ok(self
            .lock()
            .files
            .iter()
            .map(|(name, file)| MediaEntry {
                name: name.clone(),
                size: file.bytes.len() as u64,
                created: file.created,
            })
            .collect())
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> Result<u64, GatewayError> {
        let now = self.clock.now();
        let mut state = self.lock();
        // 上書きは同じファイルへの書き込みなので作成時刻は変わらない
        let created = state.files.get(name).map(|f| f.created).unwrap_or(now);
        state.files.insert(
            name.to_string(),
            StoredFile {
                bytes: bytes.to_vec(),
                created,
            },
        );
        Ok(bytes.len() as u64)
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, GatewayError> {
        self.lock()
            .files
            .get(name)
            .map(|f| f.bytes.clone())
            .ok_or_else(|| GatewayError::NotFound(format!("{name} not found")))
    }

    async fn remove(&self, name: &str) -> Result<(), GatewayError> {
        let mut state = self.lock();
        if state.undeletable.contains(name) {
            return Err(GatewayError::Storage(format!("permission denied: {name}")));
        }
        state
            .files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| GatewayError::Storage(format!("no such file: {name}")))
    }
}
