//! # リクエスト検証
//!
//! ペイロードを書き込む前に、以下の順で検査し最初の失敗で打ち切る。
//!
//! 0. メソッド（`check_method` 有効時のみ）→ 405
//! 1. 認証ヘッダーの有無 → 401
//! 2. `Bearer ` スキーム → 401
//! 3. トークン検証（定数時間比較）→ 401
//! 4. Content-Lengthの有無 → 411、形式不正 → 400
//! 5. 宣言長 ≤ 上限 → 413（ボディを読む前に判定）
//! 6. ボディを宣言長ちょうど読み切れるか → 400
//!
//! 1〜3は `require_auth` で、4は `require_content_length` で有効・無効を切り替える。
//! ボディは受理経路でのみ、1回だけ消費する。

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::{Body, Bytes, HttpBody};
use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use blobdrop_crypto::Credential;

use crate::error::DropError;

/// ペイロード上限のデフォルト（バイト）
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 10 * 1024;

/// 認証ヘッダーのスキーム接頭辞（スキーム名 + 区切りの空白）
pub const BEARER_PREFIX: &[u8] = b"Bearer ";

/// 検証段階の構成。デプロイ形態ごとに有効な検査を選ぶ。
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// 認証（段階1〜3）を行うか
    pub require_auth: bool,
    /// トークンを運ぶヘッダー名
    pub auth_header: HeaderName,
    /// POST以外を405で拒否するか
    pub check_method: bool,
    /// Content-Lengthを必須とするか。falseの場合、ヘッダーなしは上限まで読む。
    pub require_content_length: bool,
    /// ペイロード上限（バイト）
    pub max_payload_bytes: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            auth_header: AUTHORIZATION,
            check_method: false,
            require_content_length: true,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

/// リクエスト検証器。起動時に一度構築し、以降は読み取り専用で共有する。
pub struct RequestValidator {
    config: ValidatorConfig,
    credential: Option<Arc<Credential>>,
}

impl RequestValidator {
    /// 検証器を構築する。認証が有効なのにクレデンシャルがない場合はエラー。
    pub fn new(config: ValidatorConfig, credential: Option<Credential>) -> anyhow::Result<Self> {
        if config.require_auth && credential.is_none() {
            anyhow::bail!("認証が有効ですがクレデンシャルが設定されていません");
        }
        Ok(Self {
            config,
            credential: credential.map(Arc::new),
        })
    }

    /// リクエストを検証し、受理した場合はボディ全体を返す。
    pub async fn validate(
        &self,
        method: &Method,
        headers: &HeaderMap,
        body: Body,
    ) -> Result<Bytes, DropError> {
        if self.config.check_method && *method != Method::POST {
            return Err(DropError::MethodNotAllowed(method.to_string()));
        }

        if self.config.require_auth {
            self.authenticate(headers).await?;
        }

        let declared = self.declared_length(headers)?;
        if let Some(declared) = declared {
            if declared > self.config.max_payload_bytes {
                return Err(DropError::PayloadTooLarge {
                    limit: self.config.max_payload_bytes,
                });
            }
        }

        read_body(body, declared, self.config.max_payload_bytes).await
    }

    /// 段階1〜3: ヘッダーの有無、スキーム、トークン。
    async fn authenticate(&self, headers: &HeaderMap) -> Result<(), DropError> {
        let value = headers
            .get(&self.config.auth_header)
            .ok_or(DropError::MissingAuthorization)?;

        let token = value
            .as_bytes()
            .strip_prefix(BEARER_PREFIX)
            .ok_or(DropError::WrongScheme)?;

        let credential = self
            .credential
            .as_ref()
            .ok_or_else(|| DropError::Internal("クレデンシャルが未設定です".to_string()))?;

        if verify_token(credential, token).await? {
            Ok(())
        } else {
            Err(DropError::WrongToken)
        }
    }

    /// 段階4: Content-Length。ヘッダーなしで必須でない場合はNone。
    fn declared_length(&self, headers: &HeaderMap) -> Result<Option<u64>, DropError> {
        let mut values = headers.get_all(CONTENT_LENGTH).iter();
        let Some(value) = values.next() else {
            return if self.config.require_content_length {
                Err(DropError::LengthRequired)
            } else {
                Ok(None)
            };
        };

        if values.next().is_some() {
            return Err(DropError::MalformedRequest(
                "Content-Lengthヘッダーが複数あります".to_string(),
            ));
        }
        if headers.contains_key(TRANSFER_ENCODING) {
            return Err(DropError::MalformedRequest(
                "Content-LengthとTransfer-Encodingは同時に指定できません".to_string(),
            ));
        }

        parse_content_length(value).map(Some).ok_or_else(|| {
            DropError::MalformedRequest("Content-Lengthが非負整数ではありません".to_string())
        })
    }
}

/// トークンを検証する。メモリハードな形式はブロッキング用スレッドで実行する。
async fn verify_token(credential: &Arc<Credential>, token: &[u8]) -> Result<bool, DropError> {
    if !credential.is_hardened() {
        return Ok(credential.verify(token));
    }

    let credential = Arc::clone(credential);
    let token = token.to_vec();
    tokio::task::spawn_blocking(move || credential.verify(&token))
        .await
        .map_err(|e| DropError::Internal(format!("トークン検証タスクが異常終了: {e}")))
}

/// 10進数字のみからなる値だけを受け付ける（符号・空白・空文字は不可）。
fn parse_content_length(value: &HeaderValue) -> Option<u64> {
    let bytes = value.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    value.to_str().ok()?.parse().ok()
}

/// 段階6: ボディを読む。
///
/// 宣言長がある場合はちょうどその長さであることを要求し、超過・不足・途中切断は400。
/// 宣言長がない場合は上限まで読み、超過は413。
async fn read_body(mut body: Body, declared: Option<u64>, max: u64) -> Result<Bytes, DropError> {
    let limit = declared.unwrap_or(max);
    let limit = usize::try_from(limit)
        .map_err(|_| DropError::PayloadTooLarge { limit: max })?;

    let mut buffer = Vec::with_capacity(limit);
    loop {
        let frame = poll_fn(|cx| Pin::new(&mut body).poll_frame(cx)).await;
        let Some(frame) = frame else { break };

        let frame = frame.map_err(|e| {
            DropError::MalformedRequest(format!("ボディの読み取りに失敗しました: {e}"))
        })?;
        let Ok(data) = frame.into_data() else {
            continue;
        };

        if buffer.len() + data.len() > limit {
            return Err(match declared {
                Some(declared) => DropError::MalformedRequest(format!(
                    "ボディが宣言長 {declared} bytes を超えています"
                )),
                None => DropError::PayloadTooLarge { limit: max },
            });
        }
        buffer.extend_from_slice(&data);
    }

    if let Some(declared) = declared {
        if buffer.len() as u64 != declared {
            return Err(DropError::MalformedRequest(format!(
                "ボディ長 {} bytes が宣言長 {declared} bytes と一致しません",
                buffer.len()
            )));
        }
    }

    Ok(Bytes::from(buffer))
}
