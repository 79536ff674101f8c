//! # ローカルディレクトリ オブジェクトストア実装
//!
//! 開発環境・単一ノード運用向け。`{root}/{key}` にファイルとして保存する。

use std::path::PathBuf;

use axum::body::Bytes;

use super::{ObjectStore, StoreError};

/// ローカルディレクトリによるObjectStore実装。
///
/// 一時ファイルに書き込んでからリネームするため、書き込み途中で中断しても
/// 不完全なオブジェクトは `{root}/{key}` に現れない。
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// 既存ディレクトリをルートとして構築する。
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// ルートディレクトリを作成して構築する。
    pub async fn create(root: PathBuf) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self::new(root))
    }

    /// キーに対応するファイルパス。ディレクトリ階層を辿るキーは拒否する。
    fn object_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty()
            || key.starts_with('.')
            || key.contains('/')
            || key.contains('\\')
            || key.contains('\0')
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait::async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), StoreError> {
        let path = self.object_path(key)?;
        let partial = self.root.join(format!(".{key}.partial"));

        if let Err(e) = tokio::fs::write(&partial, &bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        Ok(())
    }
}
