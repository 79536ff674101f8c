//! # Gateway エラー型
//!
//! 検証段階の拒否理由とストア書き込み失敗を、そのままHTTPステータスに対応付ける。

use axum::http::StatusCode;

use crate::storage::StoreError;

/// Gatewayエラー型。
///
/// 検証エラーはRequest Validatorの境界でレスポンスに変換され、それ以上伝播しない。
/// ストアエラーはUpload Orchestratorから境界まで変換せずに伝播する。
#[derive(Debug, thiserror::Error)]
pub enum DropError {
    /// 許可されていないHTTPメソッド
    #[error("許可されていないメソッドです: {0}")]
    MethodNotAllowed(String),
    /// 認証ヘッダーなし
    #[error("認証ヘッダーがありません")]
    MissingAuthorization,
    /// Bearerスキームでない
    #[error("認証スキームが不正です")]
    WrongScheme,
    /// トークン不一致
    #[error("トークンが一致しません")]
    WrongToken,
    /// Content-Lengthヘッダーなし
    #[error("Content-Lengthヘッダーが必要です")]
    LengthRequired,
    /// ペイロードが上限を超えている
    #[error("ペイロードサイズが上限を超えています (上限: {limit} bytes)")]
    PayloadTooLarge { limit: u64 },
    /// 不正なリクエスト（Content-Lengthの形式不正、ボディ長の不一致等）
    #[error("不正なリクエスト: {0}")]
    MalformedRequest(String),
    /// 未知のパス（関数呼び出し型バインディング）
    #[error("見つかりません: {0}")]
    NotFound(String),
    /// ストレージ操作に失敗
    #[error("ストレージ操作に失敗: {0}")]
    Storage(#[from] StoreError),
    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl DropError {
    /// 対応するHTTPステータス。
    pub fn status(&self) -> StatusCode {
        match self {
            DropError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            DropError::MissingAuthorization | DropError::WrongScheme | DropError::WrongToken => {
                StatusCode::UNAUTHORIZED
            }
            DropError::LengthRequired => StatusCode::LENGTH_REQUIRED,
            DropError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            DropError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            DropError::NotFound(_) => StatusCode::NOT_FOUND,
            DropError::Storage(_) | DropError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// クライアントに返す短いプレーンテキスト。
    /// 内部エラーの詳細は含めない（ログにのみ出力する）。
    pub fn public_message(&self) -> String {
        match self {
            DropError::Storage(_) => "ストレージへの書き込みに失敗しました".to_string(),
            DropError::Internal(_) => "内部エラーが発生しました".to_string(),
            other => other.to_string(),
        }
    }
}

impl axum::response::IntoResponse for DropError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), self.public_message()).into_response()
    }
}
