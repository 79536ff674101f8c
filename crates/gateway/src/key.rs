//! # オブジェクトキー生成
//!
//! `{ISO-8601タイムスタンプ}-{UUID v4}` 形式のキーを生成する。
//! タイムスタンプは固定幅（UTC、マイクロ秒）なので、キーの辞書順は到着順と一致する。
//! 共有カウンタもロックも持たないため、並行に呼び出してよい。

use chrono::{DateTime, Utc};

/// タイムスタンプ部の書式（例: `2024-05-01T12:34:56.123456Z`）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// 新しいオブジェクトキーを生成する。
pub fn new_key(now: DateTime<Utc>) -> String {
    format!("{}-{}", now.format(TIMESTAMP_FORMAT), uuid::Uuid::new_v4())
}
