//! # blobdrop Gateway
//!
//! 認証済みの単一HTTPリクエストでバイナリペイロードを受け取り、
//! 一意なキーでオブジェクトストアへ保存する「ドロップボックス」入口。
//!
//! ## 役割
//! - Bearerトークン認証（定数時間比較）
//! - Content-Lengthとペイロード上限の検査
//! - 宣言長と実ボディ長の一致検査
//! - 到着順に並ぶ一意なオブジェクトキーの生成
//! - ストアへのアップロード（専用タスク）
//!
//! ## API エンドポイント
//! - `POST /v1/drop` — ペイロード受付
//!
//! `BINDING=invocation` の場合はHTTPサーバーを起動せず、
//! stdinのイベント1件を同じパイプラインで処理して終了する。

mod config;
mod endpoints;
mod error;
mod invocation;
mod key;
mod storage;
mod upload;
mod validate;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;

use crate::config::{Binding, DropState, GatewayConfig};
use crate::endpoints::{handle_drop, DROP_PATH};

/// Gatewayのルーターを構築する。
pub fn router(state: Arc<DropState>) -> axum::Router {
    axum::Router::new()
        .route(DROP_PATH, axum::routing::post(handle_drop))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// エントリポイント
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // 設定の読み込み（必須項目が欠けていればここで終了）
    let config = GatewayConfig::from_env()?;
    let binding = config.binding;
    let addr = config.bind_addr.clone();
    tracing::info!(
        require_auth = config.validator.require_auth,
        max_payload_bytes = config.validator.max_payload_bytes,
        backend = config.store.backend_name(),
        "設定を読み込みました"
    );

    let state = Arc::new(DropState::from_config(config).await?);

    match binding {
        Binding::Invocation => invocation::invoke_once(&state).await?,
        Binding::Server => {
            let app = router(state);
            tracing::info!("Gatewayを {} で起動します", addr);

            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// テスト
// ---------------------------------------------------------------------------
