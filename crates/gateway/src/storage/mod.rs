//! # オブジェクトストア
//!
//! 受理したペイロードの書き込み先の抽象インターフェース。
//! S3互換ストレージ実装は `s3`、ローカルディレクトリ実装は `local` サブモジュールを参照。

#[cfg(feature = "vendor-local")]
pub mod local;
#[cfg(feature = "vendor-aws")]
pub mod s3;

#[cfg(feature = "vendor-local")]
pub use local::LocalObjectStore;
#[cfg(feature = "vendor-aws")]
pub use s3::S3ObjectStore;

use std::sync::Arc;

use axum::body::Bytes;

use crate::config::StoreConfig;

/// ストア操作のエラー型。
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// ストアが非2xxを返した
    #[error("ストアがエラーを返しました: HTTP {status}")]
    Status { status: u16 },
    /// バックエンドのクライアントエラー
    #[error("ストア操作に失敗: {0}")]
    Backend(String),
    /// IOエラー
    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
    /// 不正なオブジェクトキー
    #[error("不正なオブジェクトキー: {0}")]
    InvalidKey(String),
    /// アップロードタスクがパニックまたはキャンセルで終了した
    #[error("アップロードタスクが異常終了しました: {0}")]
    Task(String),
}

/// オブジェクトストアの抽象インターフェース。
///
/// 1回のputでペイロード全体を書き込む。リトライはしない。
/// 単一オブジェクトのputは、何も残らないか完全なオブジェクトが残るかのいずれかであること。
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// `key` にペイロード全体を書き込む。
    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), StoreError>;
}

/// 設定からストアを構築する。
pub async fn build(config: &StoreConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config {
        #[cfg(feature = "vendor-aws")]
        StoreConfig::S3 {
            bucket,
            region,
            endpoint,
            access_key,
            secret_key,
        } => {
            let store = S3ObjectStore::from_config(
                bucket,
                region,
                endpoint.as_deref(),
                access_key.as_deref(),
                secret_key.as_deref(),
            )?;
            tracing::info!(bucket = %bucket, region = %region, "S3ストアを使用します");
            Ok(Arc::new(store))
        }
        #[cfg(feature = "vendor-local")]
        StoreConfig::Local { root } => {
            let store = LocalObjectStore::create(root.clone()).await?;
            tracing::info!(root = %root.display(), "ローカルストアを使用します");
            Ok(Arc::new(store))
        }
        #[allow(unreachable_patterns)]
        other => Err(anyhow::anyhow!(
            "このビルドでは無効なストアバックエンドです: {}",
            other.backend_name()
        )),
    }
}
