//! # アップロード
//!
//! 検証済みペイロードをストアへ1回のputで書き込む。
//! 書き込みは専用のtokioタスクで実行し、受付中のリクエストを止めない。
//! リトライは行わない。

use std::sync::Arc;

use axum::body::Bytes;

use crate::storage::{ObjectStore, StoreError};

/// `key` にペイロードを書き込む。
///
/// 失敗時はキーとバイト数のみをログに出力する（ペイロード本体は出力しない）。
pub async fn upload(
    store: Arc<dyn ObjectStore>,
    key: &str,
    bytes: Bytes,
) -> Result<(), StoreError> {
    let size = bytes.len();
    let task_key = key.to_string();

    let result = tokio::spawn(async move { store.put_object(&task_key, bytes).await })
        .await
        .unwrap_or_else(|e| Err(StoreError::Task(e.to_string())));

    if let Err(e) = &result {
        tracing::error!(key = %key, bytes = size, error = %e, "ストアへの書き込みに失敗");
    }
    result
}
