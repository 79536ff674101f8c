//! # S3互換オブジェクトストア実装
//!
//! AWS S3, MinIO, Cloudflare R2 等のS3互換APIを使用する。
//! 通信・リトライはrust-s3クライアントに委ねる。

use axum::body::Bytes;

use super::{ObjectStore, StoreError};

/// 保存するオブジェクトのContent-Type
const CONTENT_TYPE: &str = "application/octet-stream";

/// S3互換ストレージによるObjectStore実装。
pub struct S3ObjectStore {
    bucket: s3::Bucket,
}

impl S3ObjectStore {
    /// S3互換バケットからストアを構築する。
    pub fn new(bucket: s3::Bucket) -> Self {
        Self { bucket }
    }

    /// バケット名・リージョン・エンドポイントから構築する。
    ///
    /// `endpoint` を指定した場合はパススタイルでアクセスする（MinIO等）。
    /// アクセスキーを省略した場合はrust-s3のクレデンシャルチェーン
    /// （環境変数・プロファイル・インスタンスメタデータ）に委ねる。
    pub fn from_config(
        bucket_name: &str,
        region: &str,
        endpoint: Option<&str>,
        access_key: Option<&str>,
        secret_key: Option<&str>,
    ) -> anyhow::Result<Self> {
        let s3_region = match endpoint {
            Some(endpoint) => s3::Region::Custom {
                region: region.to_string(),
                endpoint: endpoint.to_string(),
            },
            None => region.parse::<s3::Region>()?,
        };

        let credentials = s3::creds::Credentials::new(access_key, secret_key, None, None, None)?;

        let bucket = s3::Bucket::new(bucket_name, s3_region, credentials)?;
        let bucket = if endpoint.is_some() {
            bucket.with_path_style()
        } else {
            bucket
        };

        Ok(Self::new(*bucket))
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), StoreError> {
        let response = self
            .bucket
            .put_object_with_content_type(key, &bytes, CONTENT_TYPE)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(StoreError::Status { status });
        }
        Ok(())
    }
}
