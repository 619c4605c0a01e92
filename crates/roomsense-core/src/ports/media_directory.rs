//! MediaDirectory port - 画像ディレクトリの抽象化
//!
//! ディレクトリそのものが画像の所有者で、プロセス内のハンドルは
//! 1 回の読み書きより長く生きない。
//!
//! # 実装
//! - `LocalMediaDirectory`: ファイルシステム（本番用）
//! - `InMemoryMediaDirectory`: 作成時刻を指定できるテスト用

use async_trait::async_trait;

use crate::domain::{GatewayError, MediaEntry};

#[async_trait]
pub trait MediaDirectory: Send + Sync {
    /// 通常ファイルを全て列挙する（順序は不定）
    async fn list(&self) -> Result<Vec<MediaEntry>, GatewayError>;

    /// 同名のファイルがあれば上書きする。書き込んだバイト数を返す。
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<u64, GatewayError>;

    async fn read(&self, name: &str) -> Result<Vec<u8>, GatewayError>;

    async fn remove(&self, name: &str) -> Result<(), GatewayError>;
}
