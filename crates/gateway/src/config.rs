//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みと、起動時に一度だけ構築する共有状態の定義。
//! 必須設定が欠けている場合は起動時にエラーで終了する。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderName, StatusCode};
use blobdrop_crypto::Credential;

use crate::storage::{self, ObjectStore};
use crate::validate::{RequestValidator, ValidatorConfig, DEFAULT_MAX_PAYLOAD_BYTES};

/// デフォルトの待ち受けポート
pub const DEFAULT_PORT: u16 = 8888;

/// 外部インターフェースの形態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// 常駐HTTPサーバー（`POST /v1/drop`）
    Server,
    /// 1プロセス1リクエストの関数呼び出し（stdin→stdout）
    Invocation,
}

/// ストアの接続設定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// S3互換ストレージ
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
        access_key: Option<String>,
        secret_key: Option<String>,
    },
    /// ローカルディレクトリ
    Local { root: PathBuf },
}

impl StoreConfig {
    /// `STORE_BACKEND` に指定する名前
    pub fn backend_name(&self) -> &'static str {
        match self {
            StoreConfig::S3 { .. } => "s3",
            StoreConfig::Local { .. } => "local",
        }
    }
}

/// Gatewayの起動設定。
#[derive(Debug)]
pub struct GatewayConfig {
    /// 待ち受けアドレス（`host:port`）
    pub bind_addr: String,
    /// 外部インターフェースの形態
    pub binding: Binding,
    /// サーバー側クレデンシャル（認証無効時はNone）
    pub credential: Option<Credential>,
    /// 検証段階の構成
    pub validator: ValidatorConfig,
    /// 受理・保存成功時のステータス（201または202）
    pub success_status: StatusCode,
    /// ストアの接続設定
    pub store: StoreConfig,
}

impl GatewayConfig {
    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// 任意の変数ソースから構築する。空文字の変数は未設定として扱う。
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| {
            var(name).ok_or_else(|| anyhow::anyhow!("環境変数 {name} が設定されていません"))
        };

        let binding = match var("BINDING").as_deref() {
            None | Some("server") => Binding::Server,
            Some("invocation") => Binding::Invocation,
            Some(other) => anyhow::bail!("BINDINGが不正です: {other} (server|invocation)"),
        };

        let require_auth = parse_bool(var("REQUIRE_AUTH"), "REQUIRE_AUTH", true)?;
        let credential = if require_auth {
            let raw = required("DROP_TOKEN")?;
            Some(
                raw.parse::<Credential>()
                    .context("DROP_TOKENのパースに失敗しました")?,
            )
        } else {
            None
        };

        let auth_header = match var("AUTH_HEADER") {
            Some(name) => HeaderName::from_bytes(name.trim().as_bytes())
                .with_context(|| format!("AUTH_HEADERが不正です: {name}"))?,
            None => axum::http::header::AUTHORIZATION,
        };

        let max_payload_bytes = match var("MAX_PAYLOAD_BYTES") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .with_context(|| format!("MAX_PAYLOAD_BYTESが不正です: {v}"))?,
            None => DEFAULT_MAX_PAYLOAD_BYTES,
        };

        let validator = ValidatorConfig {
            require_auth,
            auth_header,
            check_method: parse_bool(
                var("CHECK_METHOD"),
                "CHECK_METHOD",
                binding == Binding::Invocation,
            )?,
            require_content_length: parse_bool(
                var("REQUIRE_CONTENT_LENGTH"),
                "REQUIRE_CONTENT_LENGTH",
                true,
            )?,
            max_payload_bytes,
        };

        let success_status = match var("SUCCESS_STATUS").as_deref().map(str::trim) {
            None | Some("202") => StatusCode::ACCEPTED,
            Some("201") => StatusCode::CREATED,
            Some(other) => anyhow::bail!("SUCCESS_STATUSが不正です: {other} (201|202)"),
        };

        let store = match var("STORE_BACKEND").as_deref() {
            None | Some("s3") => StoreConfig::S3 {
                bucket: required("S3_BUCKET")?,
                region: required("S3_REGION")?,
                endpoint: var("S3_ENDPOINT"),
                access_key: var("S3_ACCESS_KEY"),
                secret_key: var("S3_SECRET_KEY"),
            },
            Some("local") => StoreConfig::Local {
                root: PathBuf::from(required("LOCAL_STORE_DIR")?),
            },
            Some(other) => anyhow::bail!("STORE_BACKENDが不正です: {other} (s3|local)"),
        };

        let host = var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("PORT") {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORTが不正です: {v}"))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            bind_addr: format!("{host}:{port}"),
            binding,
            credential,
            validator,
            success_status,
            store,
        })
    }
}

fn parse_bool(value: Option<String>, name: &str, default: bool) -> anyhow::Result<bool> {
    match value.as_deref().map(str::trim) {
        None => Ok(default),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => anyhow::bail!("{name}が不正です: {other} (true|false)"),
    }
}

/// Gatewayの共有状態。
///
/// 起動時に一度だけ構築し、ハンドラへ注入する。リクエスト間で共有されるのは
/// 読み取り専用のクレデンシャルとストアハンドルのみ。
pub struct DropState {
    /// リクエスト検証器
    pub validator: RequestValidator,
    /// 書き込み先ストア（トレイトで抽象化）
    pub store: Arc<dyn ObjectStore>,
    /// 受理・保存成功時のステータス
    pub success_status: StatusCode,
}

impl DropState {
    /// 設定から共有状態を構築する。
    pub async fn from_config(config: GatewayConfig) -> anyhow::Result<Self> {
        let store = storage::build(&config.store).await?;
        let validator = RequestValidator::new(config.validator, config.credential)?;
        Ok(Self {
            validator,
            store,
            success_status: config.success_status,
        })
    }
}
