//! # テスト用共通ヘルパー
//!
//! モックストアと、実TCPで待ち受けるテストサーバー。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::http::StatusCode;
use blobdrop_crypto::{Credential, HardenedParams};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Notify;

use crate::config::DropState;
use crate::storage::{ObjectStore, StoreError};
use crate::validate::{RequestValidator, ValidatorConfig};

/// テスト用の平文トークン
pub const TEST_TOKEN: &str = "test-token-0123456789";

/// テスト用のメモリ内ストア。
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// 保存済みオブジェクトをキー順で返す。
    pub fn snapshot(&self) -> Vec<(String, Bytes)> {
        let mut objects: Vec<_> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        objects.sort_by(|a, b| a.0.cmp(&b.0));
        objects
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().unwrap();
        assert!(
            !objects.contains_key(key),
            "同一キーへの書き込みが発生した: {key}"
        );
        objects.insert(key.to_string(), bytes);
        Ok(())
    }
}

/// 常に503相当で失敗するストア。
pub struct FailingStore;

#[async_trait::async_trait]
impl ObjectStore for FailingStore {
    async fn put_object(&self, _key: &str, _bytes: Bytes) -> Result<(), StoreError> {
        Err(StoreError::Status { status: 503 })
    }
}

/// 書き込み中にパニックするストア。
pub struct PanickingStore;

#[async_trait::async_trait]
impl ObjectStore for PanickingStore {
    async fn put_object(&self, _key: &str, _bytes: Bytes) -> Result<(), StoreError> {
        panic!("ストア内部でパニック");
    }
}

/// `release` が通知されるまで書き込みを保留するストア。
/// 書き込み開始時に `entered` を通知する。
#[derive(Default)]
pub struct SlowStore {
    pub entered: Notify,
    pub release: Notify,
    inner: MemoryStore,
}

impl SlowStore {
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait::async_trait]
impl ObjectStore for SlowStore {
    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), StoreError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.put_object(key, bytes).await
    }
}

/// 軽量パラメータでTEST_TOKENから作ったHardened形式のクレデンシャル。
pub fn light_hardened_credential() -> Credential {
    Credential::hardened_of(
        TEST_TOKEN.as_bytes(),
        HardenedParams {
            cost: 16,
            block_size: 1,
            parallelism: 1,
            output_length: 32,
        },
        "test-salt",
    )
    .unwrap()
}

/// テスト用DropStateを構築するヘルパー
pub fn test_state(config: ValidatorConfig, store: Arc<dyn ObjectStore>) -> Arc<DropState> {
    let credential = config
        .require_auth
        .then(|| Credential::digest_of(TEST_TOKEN.as_bytes()));
    Arc::new(DropState {
        validator: RequestValidator::new(config, credential).unwrap(),
        store,
        success_status: StatusCode::ACCEPTED,
    })
}

/// ルーターを実TCPで起動し、ポート番号を返す。
pub async fn start_server(state: Arc<DropState>) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = crate::router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    port
}

/// 生のHTTPリクエストを送信し、レスポンスのステータスコードと本文を返す。
/// 多くのHTTPクライアントが送れない形式（不正なContent-Length等）の検証に使う。
pub async fn raw_request(port: u16, request: &[u8]) -> (u16, String) {
    let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
        .await
        .unwrap();
    stream.write_all(request).await.unwrap();
    stream.flush().await.unwrap();
    read_response(&mut stream).await
}

/// レスポンスを読み、ステータスコードと本文を返す。
async fn read_response(stream: &mut tokio::net::TcpStream) -> (u16, String) {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = tokio::time::timeout(std::time::Duration::from_secs(5), stream.read(&mut buf))
            .await
            .expect("レスポンスの読み取りがタイムアウトした")
            .unwrap_or(0);
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
        if response_complete(&raw) {
            break;
        }
    }

    let text = String::from_utf8_lossy(&raw).to_string();
    let status = text
        .split(' ')
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("不正なレスポンス: {text:?}"));
    let body = text
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_default();
    (status, body)
}

/// ヘッダーと、Content-Lengthで示された本文を受信し終えたか。
fn response_complete(raw: &[u8]) -> bool {
    let Some(head_end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let head = String::from_utf8_lossy(&raw[..head_end]);
    let length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    raw.len() - (head_end + 4) >= length
}
