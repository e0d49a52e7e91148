//! # S3互換マーカーストア実装
//!
//! AWS S3, MinIO 等のS3互換APIを使用する。マーカー用バケットはバージョニングを
//! 有効化しておく必要がある（PUTレスポンスに `x-amz-version-id` が無い場合はエラー）。
//!
//! バージョン一覧（ListObjectVersions）は rust-s3 が提供しないため、
//! 署名付きGETを `reqwest` で取得してXMLをパースする。S3は同一キーのバージョンを
//! 新しい順に返すので、結合後に反転して古い順にする。

use std::collections::HashMap;

use serde::Deserialize;

use super::{MarkerStore, UploadSigner};
use crate::error::GatewayError;
use crate::marker::{MarkerVersion, MARKER_CONTENT_ENCODING, MARKER_CONTENT_TYPE};

/// 一覧取得用の署名付きURLの有効期限（秒）。取得直後に使い捨てる。
const LIST_PRESIGN_EXPIRY_SECS: u32 = 60;

/// 一覧取得のページ数上限。1キーあたりのバージョン数はリンク1つの競合数に等しい。
const MAX_LIST_PAGES: usize = 100;

/// S3互換ストレージによるマーカーストア兼署名付きURL発行元。
pub struct S3Storage {
    /// 内部通信用バケット（マーカーの読み書き）
    bucket_internal: s3::Bucket,
    /// クライアント向けバケット（署名付きURL生成用）。
    /// 外部ホスト名が異なる場合に使用。Noneの場合はbucket_internalを使用する。
    bucket_public: Option<s3::Bucket>,
    /// マーカー書き込み用バケット（Content-Encodingヘッダ付き）
    bucket_marker: s3::Bucket,
    /// バージョン一覧取得用HTTPクライアント
    http_client: reqwest::Client,
}

impl S3Storage {
    /// S3互換バケットから構築する。
    pub fn new(bucket_internal: s3::Bucket, bucket_public: Option<s3::Bucket>) -> Self {
        let mut bucket_marker = bucket_internal.clone();
        bucket_marker.add_header("Content-Encoding", MARKER_CONTENT_ENCODING);
        Self {
            bucket_internal,
            bucket_public,
            bucket_marker,
            http_client: reqwest::Client::new(),
        }
    }

    /// エンドポイントと認証情報からS3互換バケットを初期化する。
    fn init_bucket(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        bucket_name: &str,
    ) -> anyhow::Result<s3::Bucket> {
        // AWS S3エンドポイント（s3.REGION.amazonaws.com）からリージョンを自動検出。
        // 非AWSエンドポイントではus-east-1をフォールバックとして使用。
        let region_name = std::env::var("S3_REGION")
            .ok()
            .unwrap_or_else(|| detect_region(endpoint));
        let region = s3::Region::Custom {
            region: region_name,
            endpoint: endpoint.to_string(),
        };

        let credentials = s3::creds::Credentials::new(
            Some(access_key),
            Some(secret_key),
            None,
            None,
            None,
        )?;

        let bucket = s3::Bucket::new(bucket_name, region, credentials)?.with_path_style();

        Ok(*bucket)
    }

    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        let endpoint = std::env::var("S3_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:9000".to_string());
        let access_key =
            std::env::var("S3_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let secret_key =
            std::env::var("S3_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let bucket_name =
            std::env::var("S3_BUCKET").unwrap_or_else(|_| "oncelink-uploads".to_string());

        let bucket_internal =
            Self::init_bucket(&endpoint, &access_key, &secret_key, &bucket_name)?;

        let bucket_public = std::env::var("S3_PUBLIC_ENDPOINT")
            .ok()
            .map(|public_ep| {
                tracing::info!(
                    s3_public_endpoint = %public_ep,
                    "クライアント向けS3エンドポイントを設定"
                );
                Self::init_bucket(&public_ep, &access_key, &secret_key, &bucket_name)
            })
            .transpose()?;

        tracing::info!(s3_endpoint = %endpoint, s3_bucket = %bucket_name, "S3ストレージを初期化");
        Ok(Self::new(bucket_internal, bucket_public))
    }

    /// ListObjectVersionsの1ページを取得する。
    async fn list_versions_page(
        &self,
        key: &str,
        key_marker: Option<&str>,
        version_id_marker: Option<&str>,
    ) -> Result<ListVersionsResult, GatewayError> {
        let mut queries = HashMap::new();
        queries.insert("versions".to_string(), String::new());
        queries.insert("prefix".to_string(), key.to_string());
        if let Some(marker) = key_marker {
            queries.insert("key-marker".to_string(), marker.to_string());
        }
        if let Some(marker) = version_id_marker {
            queries.insert("version-id-marker".to_string(), marker.to_string());
        }

        let url = self
            .bucket_internal
            .presign_get("/", LIST_PRESIGN_EXPIRY_SECS, Some(queries))
            .await
            .map_err(|e| GatewayError::Storage(format!("バージョン一覧URL生成失敗: {e}")))?;

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Storage(format!("バージョン一覧の取得に失敗: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Storage(format!("レスポンス読み取り失敗: {e}")))?;

        if !status.is_success() {
            return Err(GatewayError::Storage(format!(
                "バージョン一覧の取得に失敗: HTTP {status} - {body}"
            )));
        }

        parse_list_versions(&body)
    }
}

#[async_trait::async_trait]
impl UploadSigner for S3Storage {
    async fn presign_upload(
        &self,
        object_key: &str,
        expiry_secs: u32,
    ) -> Result<String, GatewayError> {
        let public_bucket = self.bucket_public.as_ref().unwrap_or(&self.bucket_internal);

        public_bucket
            .presign_put(object_key, expiry_secs, None, None)
            .await
            .map_err(|e| GatewayError::Storage(format!("署名付きアップロードURL生成失敗: {e}")))
    }
}

#[async_trait::async_trait]
impl MarkerStore for S3Storage {
    async fn exists(&self, key: &str) -> Result<bool, GatewayError> {
        match self.bucket_internal.head_object(key).await {
            Ok((_, status)) => head_status_to_exists(status),
            Err(s3::error::S3Error::HttpFailWithBody(status, _)) => head_status_to_exists(status),
            Err(e) => Err(GatewayError::Storage(format!("HEAD {key} に失敗: {e}"))),
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<MarkerVersion, GatewayError> {
        let response = self
            .bucket_marker
            .put_object_with_content_type(key, &body, MARKER_CONTENT_TYPE)
            .await
            .map_err(|e| GatewayError::Storage(format!("PUT {key} に失敗: {e}")))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(GatewayError::Storage(format!("PUT {key} に失敗: HTTP {status}")));
        }

        version_from_headers(&response.headers()).ok_or_else(|| {
            GatewayError::Consistency(format!(
                "PUT {key} のレスポンスにバージョンIDがありません（バケットのバージョニングが無効）"
            ))
        })
    }

    async fn list_versions(&self, key: &str) -> Result<Vec<MarkerVersion>, GatewayError> {
        let mut pages = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let page = self
                .list_versions_page(key, key_marker.as_deref(), version_id_marker.as_deref())
                .await?;
            let truncated = page.is_truncated;
            key_marker = page.next_key_marker.clone();
            version_id_marker = page.next_version_id_marker.clone();
            pages.push(page);

            if !truncated {
                return Ok(versions_oldest_first(pages, key));
            }
        }

        Err(GatewayError::Consistency(format!(
            "{key} のバージョン一覧が {MAX_LIST_PAGES} ページを超えました"
        )))
    }
}

/// 取得順（新しい順）のページ列を結合し、`key` と完全一致するバージョンを古い順で返す。
///
/// prefix一致で別キーが混ざり得るため、キーの完全一致で絞り込む。
fn versions_oldest_first(pages: Vec<ListVersionsResult>, key: &str) -> Vec<MarkerVersion> {
    let mut versions: Vec<MarkerVersion> = pages
        .into_iter()
        .flat_map(|page| page.versions)
        .filter(|v| v.key == key)
        .map(|v| MarkerVersion::new(v.version_id))
        .collect();
    versions.reverse();
    versions
}

/// エンドポイントのホスト名からAWSリージョンを推定する。
fn detect_region(endpoint: &str) -> String {
    endpoint
        .find("s3.")
        .and_then(|start| {
            let rest = &endpoint[start + 3..];
            rest.find(".amazonaws.com").map(|end| rest[..end].to_string())
        })
        .unwrap_or_else(|| "us-east-1".to_string())
}

/// HEADのステータスを存在判定に変換する。404のみ「不在」で、それ以外の失敗はエラー。
fn head_status_to_exists(status: u16) -> Result<bool, GatewayError> {
    match status {
        200..=299 => Ok(true),
        404 => Ok(false),
        other => Err(GatewayError::Storage(format!("HEADが失敗: HTTP {other}"))),
    }
}

fn version_from_headers(headers: &HashMap<String, String>) -> Option<MarkerVersion> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("x-amz-version-id"))
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty() && *value != "null")
        .map(MarkerVersion::new)
}

/// ListObjectVersionsのレスポンス（必要なフィールドのみ）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListVersionsResult {
    #[serde(default)]
    is_truncated: bool,
    next_key_marker: Option<String>,
    next_version_id_marker: Option<String>,
    #[serde(rename = "Version", default)]
    versions: Vec<VersionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionEntry {
    key: String,
    version_id: String,
}

fn parse_list_versions(xml: &str) -> Result<ListVersionsResult, GatewayError> {
    quick_xml::de::from_str(xml)
        .map_err(|e| GatewayError::Storage(format!("バージョン一覧のパースに失敗: {e}")))
}
