//! # 関数呼び出し型バインディング
//!
//! プラットフォームのディスパッチャからリクエスト単位で起動される形態。
//! stdinから `InvocationEvent` を1件読み、HTTPサーバーと同じパイプラインで処理し、
//! `InvocationResponse` をstdoutへ書く。

use std::collections::BTreeMap;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use base64::Engine;
use blobdrop_types::{InvocationEvent, InvocationResponse};
use futures_util::stream;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::DropState;
use crate::endpoints::{process_drop, DROP_PATH};
use crate::error::DropError;

/// イベント1件を処理してレスポンスを返す。
pub async fn handle_invocation(state: &DropState, event: InvocationEvent) -> InvocationResponse {
    match run(state, event).await {
        Ok(_) => InvocationResponse {
            status_code: state.success_status.as_u16(),
            body: String::new(),
        },
        Err(e) => InvocationResponse {
            status_code: e.status().as_u16(),
            body: e.public_message(),
        },
    }
}

async fn run(state: &DropState, event: InvocationEvent) -> Result<String, DropError> {
    if event.path != DROP_PATH {
        return Err(DropError::NotFound(event.path));
    }

    let method = Method::from_bytes(event.method.as_bytes())
        .map_err(|_| DropError::MalformedRequest(format!("不正なメソッド: {}", event.method)))?;
    let headers = to_header_map(&event.headers);
    let body = into_body(event.body, event.is_base64_encoded);

    process_drop(state, &method, &headers, body).await
}

/// HTTPヘッダーとして表現できないエントリは捨てる。
/// 認証ヘッダーが捨てられた場合はヘッダーなしとして検証段階で拒否される。
fn to_header_map(entries: &BTreeMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(entries.len());
    for (name, value) in entries {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            tracing::debug!(header = %name, "不正なヘッダーを無視");
            continue;
        };
        headers.append(name, value);
    }
    headers
}

/// ボディを遅延デコードする `Body` に変換する。
///
/// Base64のデコードはボディを読む段階（検証の最終段）で行い、
/// 失敗は読み取りエラーとして400になる。
fn into_body(body: Option<String>, is_base64_encoded: bool) -> Body {
    match body {
        None => Body::empty(),
        Some(body) if is_base64_encoded => Body::from_stream(stream::once(async move {
            base64::engine::general_purpose::STANDARD
                .decode(body)
                .map(Bytes::from)
        })),
        Some(body) => Body::from(body),
    }
}

/// stdinからイベントを読み、処理結果をstdoutへ書く。
pub async fn invoke_once(state: &DropState) -> anyhow::Result<()> {
    let mut input = Vec::new();
    tokio::io::stdin().read_to_end(&mut input).await?;

    let response = match serde_json::from_slice::<InvocationEvent>(&input) {
        Ok(event) => handle_invocation(state, event).await,
        Err(e) => {
            tracing::warn!(error = %e, "イベントのパースに失敗");
            let err = DropError::MalformedRequest("イベントのパースに失敗しました".to_string());
            InvocationResponse {
                status_code: err.status().as_u16(),
                body: err.public_message(),
            }
        }
    };

    let mut output = serde_json::to_vec(&response)?;
    output.push(b'\n');
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&output).await?;
    stdout.flush().await?;
    Ok(())
}
