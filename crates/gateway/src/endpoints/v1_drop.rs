//! # POST /v1/drop
//!
//! 認証済みペイロードを受け取り、一意なキーでストアへ保存する。
//!
//! リクエストごとの状態遷移:
//! `受信 → 検証 → {拒否 | 受理} → (受理のみ) アップロード → {保存完了 | 保存失敗}`

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use chrono::Utc;

use crate::config::DropState;
use crate::error::DropError;
use crate::key::new_key;
use crate::upload::upload;

/// エンドポイントのパス
pub const DROP_PATH: &str = "/v1/drop";

/// 検証・キー生成・アップロードを順に行い、保存したキーを返す。
///
/// 拒否された場合はストアに一切書き込まない。
pub async fn process_drop(
    state: &DropState,
    method: &Method,
    headers: &HeaderMap,
    body: Body,
) -> Result<String, DropError> {
    let bytes = state
        .validator
        .validate(method, headers, body)
        .await
        .inspect_err(|e| {
            tracing::warn!(status = e.status().as_u16(), reason = %e, "リクエストを拒否");
        })?;

    let key = new_key(Utc::now());
    let size = bytes.len();

    upload(Arc::clone(&state.store), &key, bytes).await?;

    tracing::info!(key = %key, bytes = size, "オブジェクトを保存");
    Ok(key)
}

/// POST /v1/drop — ペイロード受付。
///
/// 成功時は本文なしで201または202（設定による）を返す。
pub async fn handle_drop(
    State(state): State<Arc<DropState>>,
    request: Request,
) -> Result<StatusCode, DropError> {
    let (parts, body) = request.into_parts();
    process_drop(&state, &parts.method, &parts.headers, body).await?;
    Ok(state.success_status)
}
