//! # blobdrop 暗号処理
//!
//! 単一の静的Bearerトークンを検証するためのサーバー側クレデンシャルと、
//! その生成ルーチンを提供する。
//!
//! ## クレデンシャル形式
//! | 形式 | サーバー側保持値 |
//! |------|------------|
//! | Digest | `Base64(SHA-256(token))` |
//! | Hardened | `{cost}\|{blockSize}\|{parallelism}\|{outputLength}\|{salt}\|{Base64(scrypt出力)}` |
//!
//! いずれの形式も比較は `subtle` による定数時間比較で行う。
//! 平文トークンはサーバー側に保持しない。

mod credential;
mod generate;

use sha2::{Digest, Sha256};

pub use credential::{Credential, CredentialError, HardenedParams};
pub use generate::{generate_token, TokenForm, CLIENT_TOKEN_BYTES, SALT_BYTES};

/// Base64エンジン（Standard）
pub(crate) fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// Base64エンジン（URLセーフ、パディングなし）
pub(crate) fn b64_url() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
}

/// SHA-256ハッシュ計算。
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}
