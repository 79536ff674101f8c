//! # トークン生成
//!
//! 運用者が帯域外で実行するクレデンシャル生成ルーチン。
//! クライアントに渡す平文トークンと、サーバーに保持させる検証用表現の組を返す。

use base64::Engine;
use rand::RngCore;

use crate::b64_url;
use crate::credential::{Credential, CredentialError, HardenedParams};

/// クライアントトークンのエントロピー（バイト）
pub const CLIENT_TOKEN_BYTES: usize = 64;

/// Hardened形式のsaltの長さ（バイト、エンコード前）
pub const SALT_BYTES: usize = 16;

/// サーバー側保持値の形式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenForm {
    /// `Base64(SHA-256(token))`
    ///
    /// トークン自体が十分に長いランダム値であるため、saltや鍵導出は不要。
    Digest,
    /// scryptによる導出鍵
    Hardened(HardenedParams),
}

/// 新しいトークンを生成し、`(クライアント用平文トークン, サーバー保持値)` を返す。
pub fn generate_token(form: TokenForm) -> Result<(String, String), CredentialError> {
    let client_token = random_urlsafe(CLIENT_TOKEN_BYTES);

    let credential = match form {
        TokenForm::Digest => Credential::digest_of(client_token.as_bytes()),
        TokenForm::Hardened(params) => {
            let salt = random_urlsafe(SALT_BYTES);
            Credential::hardened_of(client_token.as_bytes(), params, &salt)?
        }
    };

    Ok((client_token, credential.to_string()))
}

/// OSの乱数源から `len` バイトを取り、URLセーフBase64（パディングなし）で返す。
fn random_urlsafe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    b64_url().encode(bytes)
}
