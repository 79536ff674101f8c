//! # blobdrop 共有型定義
//!
//! 関数呼び出し型バインディング（プラットフォームのディスパッチャから
//! リクエスト単位で起動される形態）で受け渡すデータ構造。
//!
//! ## エンコーディング規則
//! - Base64: バイナリのリクエストボディ（`is_base64_encoded = true` の場合）

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// 関数呼び出しイベント
// ---------------------------------------------------------------------------

/// ディスパッチャから渡される1リクエスト分のイベント。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationEvent {
    /// HTTPメソッド（例: "POST"）
    pub method: String,
    /// リクエストパス（例: "/v1/drop"）
    pub path: String,
    /// リクエストヘッダー。ヘッダー名の大文字小文字は区別しない。
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// リクエストボディ。ボディなしの場合はNone。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// `body` がBase64エンコードされているか
    #[serde(default)]
    pub is_base64_encoded: bool,
}

/// ディスパッチャへ返すレスポンス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    /// HTTPステータスコード
    pub status_code: u16,
    /// プレーンテキストのレスポンスボディ（成功時は空）
    pub body: String,
}
