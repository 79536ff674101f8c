//! # サーバー側クレデンシャル
//!
//! 環境変数等から読み込んだ文字列をパースし、候補トークンを定数時間で検証する。

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use subtle::ConstantTimeEq;

use crate::{b64, sha256};

/// Hardened形式の区切り文字
const FIELD_SEPARATOR: char = '|';

/// scryptの出力長の下限（バイト）
pub const MIN_OUTPUT_LENGTH: usize = 10;

/// scryptの出力長の上限（バイト）
pub const MAX_OUTPUT_LENGTH: usize = 64;

/// クレデンシャルのエラー型
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// 空のクレデンシャル
    #[error("クレデンシャルが空です")]
    Empty,
    /// Digest形式のデコード失敗
    #[error("Digest形式のクレデンシャルが不正です: {0}")]
    InvalidDigest(String),
    /// Hardened形式のフィールド数が不正
    #[error("Hardened形式のフィールド数が不正です: {0}個 (期待値: 6個)")]
    FieldCount(usize),
    /// Hardened形式の個別フィールドが不正
    #[error("Hardened形式のフィールド {field} が不正です: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
    /// scryptパラメータが不正
    #[error("scryptパラメータが不正です: {0}")]
    InvalidParams(String),
}

/// scryptのパラメータ。
///
/// `cost` はscryptのN（2の累乗）で、エンコード上もNそのものを保持する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardenedParams {
    /// コストパラメータ N
    pub cost: u64,
    /// ブロックサイズ r
    pub block_size: u32,
    /// 並列度 p
    pub parallelism: u32,
    /// 導出鍵の長さ（バイト）
    pub output_length: usize,
}

impl Default for HardenedParams {
    fn default() -> Self {
        Self {
            cost: 16384,
            block_size: 8,
            parallelism: 1,
            output_length: 64,
        }
    }
}

impl HardenedParams {
    /// scryptクレートのパラメータへ変換する。
    pub fn to_scrypt(&self) -> Result<scrypt::Params, CredentialError> {
        if self.cost < 2 || !self.cost.is_power_of_two() {
            return Err(CredentialError::InvalidParams(format!(
                "costは2以上の2の累乗である必要があります: {}",
                self.cost
            )));
        }
        if !(MIN_OUTPUT_LENGTH..=MAX_OUTPUT_LENGTH).contains(&self.output_length) {
            return Err(CredentialError::InvalidParams(format!(
                "outputLengthは{MIN_OUTPUT_LENGTH}〜{MAX_OUTPUT_LENGTH}である必要があります: {}",
                self.output_length
            )));
        }
        let log_n = self.cost.trailing_zeros() as u8;
        scrypt::Params::new(log_n, self.block_size, self.parallelism, self.output_length)
            .map_err(|e| CredentialError::InvalidParams(e.to_string()))
    }

    /// 候補とsaltからscryptで鍵を導出する。
    pub(crate) fn derive(&self, candidate: &[u8], salt: &[u8]) -> Result<Vec<u8>, CredentialError> {
        let params = self.to_scrypt()?;
        let mut output = vec![0u8; self.output_length];
        scrypt::scrypt(candidate, salt, &params, &mut output)
            .map_err(|e| CredentialError::InvalidParams(e.to_string()))?;
        Ok(output)
    }
}

/// サーバーが保持する唯一のBearerトークンの検証用表現。
///
/// 起動時に一度だけ構築し、以降は不変。`Debug` 出力では秘密情報を伏せる。
#[derive(Clone)]
pub enum Credential {
    /// `Base64(SHA-256(token))`
    Digest {
        /// 正規化済みのBase64エンコード文字列
        encoded: String,
    },
    /// scryptによる導出鍵
    Hardened {
        params: HardenedParams,
        salt: String,
        derived: Vec<u8>,
    },
}

impl Credential {
    /// 平文トークンからDigest形式のクレデンシャルを作る。
    pub fn digest_of(token: &[u8]) -> Self {
        Credential::Digest {
            encoded: encode_digest(token),
        }
    }

    /// 平文トークンからHardened形式のクレデンシャルを作る。
    pub fn hardened_of(
        token: &[u8],
        params: HardenedParams,
        salt: &str,
    ) -> Result<Self, CredentialError> {
        validate_salt(salt)?;
        let derived = params.derive(token, salt.as_bytes())?;
        Ok(Credential::Hardened {
            params,
            salt: salt.to_string(),
            derived,
        })
    }

    /// 検証にメモリハードな鍵導出を伴うか。
    /// 呼び出し側はtrueの場合にブロッキング用スレッドで検証すべき。
    pub fn is_hardened(&self) -> bool {
        matches!(self, Credential::Hardened { .. })
    }

    /// 候補トークンが一致するかを定数時間で判定する。
    ///
    /// 不正な候補（空、不正なエンコーディング）は単にfalseを返す。
    pub fn verify(&self, candidate: &[u8]) -> bool {
        match self {
            Credential::Digest { encoded } => {
                let candidate_encoded = encode_digest(candidate);
                candidate_encoded
                    .as_bytes()
                    .ct_eq(encoded.as_bytes())
                    .into()
            }
            Credential::Hardened {
                params,
                salt,
                derived,
            } => match params.derive(candidate, salt.as_bytes()) {
                Ok(candidate_derived) => candidate_derived.as_slice().ct_eq(derived).into(),
                Err(_) => false,
            },
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Digest { .. } => f
                .debug_struct("Credential::Digest")
                .field("encoded", &"<redacted>")
                .finish(),
            Credential::Hardened { params, .. } => f
                .debug_struct("Credential::Hardened")
                .field("params", params)
                .field("salt", &"<redacted>")
                .field("derived", &"<redacted>")
                .finish(),
        }
    }
}

/// サーバー側保持値としてのエンコード。`FromStr` と対になる。
impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Digest { encoded } => f.write_str(encoded),
            Credential::Hardened {
                params,
                salt,
                derived,
            } => write!(
                f,
                "{}|{}|{}|{}|{}|{}",
                params.cost,
                params.block_size,
                params.parallelism,
                params.output_length,
                salt,
                b64().encode(derived)
            ),
        }
    }
}

impl FromStr for Credential {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CredentialError::Empty);
        }

        if !s.contains(FIELD_SEPARATOR) {
            let digest = b64()
                .decode(s)
                .map_err(|e| CredentialError::InvalidDigest(e.to_string()))?;
            if digest.len() != 32 {
                return Err(CredentialError::InvalidDigest(format!(
                    "SHA-256ダイジェストは32バイトである必要があります: {}バイト",
                    digest.len()
                )));
            }
            return Ok(Credential::Digest {
                encoded: b64().encode(digest),
            });
        }

        let fields: Vec<&str> = s.split(FIELD_SEPARATOR).collect();
        if fields.len() != 6 {
            return Err(CredentialError::FieldCount(fields.len()));
        }

        let params = HardenedParams {
            cost: parse_field("cost", fields[0])?,
            block_size: parse_field("blockSize", fields[1])?,
            parallelism: parse_field("parallelism", fields[2])?,
            output_length: parse_field("outputLength", fields[3])?,
        };
        params.to_scrypt()?;

        let salt = fields[4];
        validate_salt(salt)?;

        let derived = b64()
            .decode(fields[5])
            .map_err(|e| CredentialError::InvalidField {
                field: "derivedKey",
                reason: e.to_string(),
            })?;
        if derived.len() != params.output_length {
            return Err(CredentialError::InvalidField {
                field: "derivedKey",
                reason: format!(
                    "長さがoutputLengthと一致しません: {} != {}",
                    derived.len(),
                    params.output_length
                ),
            });
        }

        Ok(Credential::Hardened {
            params,
            salt: salt.to_string(),
            derived,
        })
    }
}

fn encode_digest(token: &[u8]) -> String {
    b64().encode(sha256(token))
}

fn parse_field<T: FromStr>(field: &'static str, value: &str) -> Result<T, CredentialError>
where
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| CredentialError::InvalidField {
        field,
        reason: e.to_string(),
    })
}

fn validate_salt(salt: &str) -> Result<(), CredentialError> {
    if salt.is_empty() || salt.contains(FIELD_SEPARATOR) {
        return Err(CredentialError::InvalidField {
            field: "salt",
            reason: "saltは空でなく、区切り文字を含まない必要があります".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// テスト用の軽量scryptパラメータ
    fn light_params() -> HardenedParams {
        HardenedParams {
            cost: 16,
            block_size: 1,
            parallelism: 1,
            output_length: 32,
        }
    }

    /// SHA-256("abc")のBase64表現で検証できることを確認
    #[test]
    fn test_digest_known_vector() {
        let credential: Credential = "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0="
            .parse()
            .unwrap();

        assert!(!credential.is_hardened());
        assert!(credential.verify(b"abc"));
        assert!(!credential.verify(b"abd"));
        assert!(!credential.verify(b"ab"));
        assert!(!credential.verify(b""));
    }

    /// 末尾の改行を含むクレデンシャル文字列が受理されることを確認
    #[test]
    fn test_digest_trims_whitespace() {
        let credential: Credential = "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=\n"
            .parse()
            .unwrap();
        assert!(credential.verify(b"abc"));
    }

    /// 先頭一致・末尾一致の誤トークンがいずれも拒否されることを確認
    #[test]
    fn test_digest_rejects_near_misses() {
        let credential = Credential::digest_of(b"correct-horse-battery-staple");

        assert!(credential.verify(b"correct-horse-battery-staple"));
        assert!(!credential.verify(b"correct-horse-battery-stapleX"));
        assert!(!credential.verify(b"Xorrect-horse-battery-staple"));
        assert!(!credential.verify(b"correct-horse-battery-staplf"));
        assert!(!credential.verify(&[0xff, 0xfe, 0x00]));
    }

    /// Hardened形式でエンコード→パース→検証が一貫することを確認
    #[test]
    fn test_hardened_encode_parse_verify() {
        let credential = Credential::hardened_of(b"my-token", light_params(), "c2FsdA").unwrap();
        assert!(credential.is_hardened());

        let encoded = credential.to_string();
        assert!(encoded.starts_with("16|1|1|32|c2FsdA|"));

        let parsed: Credential = encoded.parse().unwrap();
        assert!(parsed.verify(b"my-token"));
        assert!(!parsed.verify(b"my-tokem"));
        assert!(!parsed.verify(b""));
    }

    /// saltが異なれば同じトークンでも導出鍵が異なることを確認
    #[test]
    fn test_hardened_salt_matters() {
        let a = Credential::hardened_of(b"token", light_params(), "salt-a").unwrap();
        let b = Credential::hardened_of(b"token", light_params(), "salt-b").unwrap();
        assert_ne!(a.to_string(), b.to_string());
    }

    /// 不正なクレデンシャル文字列が拒否されることを確認
    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!("".parse::<Credential>(), Err(CredentialError::Empty)));
        assert!(matches!(
            "not base64!".parse::<Credential>(),
            Err(CredentialError::InvalidDigest(_))
        ));
        // 32バイトでないダイジェスト
        assert!(matches!(
            "YWJj".parse::<Credential>(),
            Err(CredentialError::InvalidDigest(_))
        ));
        assert!(matches!(
            "16|1|1|32|salt".parse::<Credential>(),
            Err(CredentialError::FieldCount(5))
        ));
        assert!(matches!(
            "abc|1|1|32|salt|AAAA".parse::<Credential>(),
            Err(CredentialError::InvalidField { field: "cost", .. })
        ));
        // 2の累乗でないcost
        assert!(matches!(
            "15|1|1|32|salt|AAAA".parse::<Credential>(),
            Err(CredentialError::InvalidParams(_))
        ));
        // 出力長とderivedKeyの長さの不一致
        assert!(matches!(
            "16|1|1|32|salt|AAAA".parse::<Credential>(),
            Err(CredentialError::InvalidField {
                field: "derivedKey",
                ..
            })
        ));
    }

    /// Debug出力に秘密情報が含まれないことを確認
    #[test]
    fn test_debug_redacts_secret() {
        let credential = Credential::digest_of(b"abc");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("ungWv48B"));
        assert!(debug.contains("<redacted>"));

        let hardened = Credential::hardened_of(b"abc", light_params(), "pepper").unwrap();
        let debug = format!("{hardened:?}");
        assert!(!debug.contains("pepper"));
    }
}
