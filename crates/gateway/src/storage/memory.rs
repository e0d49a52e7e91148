//! # プロセス内マーカーストア
//!
//! S3のバージョニングを模したメモリ内実装。ローカル開発（`STORAGE_BACKEND=memory`）と
//! テストで使用する。プロセスを跨いだ共有はできないため、複数インスタンス構成では使わない。

use std::collections::HashMap;
use std::sync::Mutex;

use super::{MarkerStore, UploadSigner};
use crate::error::GatewayError;
use crate::marker::{MarkerVersion, MARKER_CONTENT_ENCODING, MARKER_CONTENT_TYPE};

/// 保存済みオブジェクトの1バージョン。本体とヘッダはテストでのみ参照する。
#[derive(Debug, Clone)]
#[cfg_attr(not(test), allow(dead_code))]
pub struct StoredObject {
    /// バージョンID（UUID、順序情報を持たない）
    pub version: MarkerVersion,
    /// 本体
    pub body: Vec<u8>,
    /// Content-Type
    pub content_type: &'static str,
    /// Content-Encoding
    pub content_encoding: &'static str,
}

/// メモリ内のバージョン付きストア兼ローカル署名付きURL発行元。
pub struct MemoryStorage {
    /// 署名付きURLのベース（例: `http://localhost:9000/oncelink`）
    base_url: String,
    /// キー → 作成順のバージョン列
    objects: Mutex<HashMap<String, Vec<StoredObject>>>,
}

impl MemoryStorage {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<StoredObject>>>, GatewayError> {
        self.objects
            .lock()
            .map_err(|_| GatewayError::Storage("メモリストアのロックが汚染されています".to_string()))
    }

    /// キーの全バージョンを古い順で返す。
    #[cfg(test)]
    pub fn versions_of(&self, key: &str) -> Vec<StoredObject> {
        self.lock()
            .map(|objects| objects.get(key).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl UploadSigner for MemoryStorage {
    async fn presign_upload(
        &self,
        object_key: &str,
        expiry_secs: u32,
    ) -> Result<String, GatewayError> {
        let signature = uuid::Uuid::new_v4().simple();
        Ok(format!(
            "{}/{}?X-Amz-Expires={}&X-Amz-Signature={}",
            self.base_url, object_key, expiry_secs, signature
        ))
    }
}

#[async_trait::async_trait]
impl MarkerStore for MemoryStorage {
    async fn exists(&self, key: &str) -> Result<bool, GatewayError> {
        Ok(self
            .lock()?
            .get(key)
            .is_some_and(|versions| !versions.is_empty()))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<MarkerVersion, GatewayError> {
        let version = MarkerVersion::new(uuid::Uuid::new_v4().to_string());
        self.lock()?
            .entry(key.to_string())
            .or_default()
            .push(StoredObject {
                version: version.clone(),
                body,
                content_type: MARKER_CONTENT_TYPE,
                content_encoding: MARKER_CONTENT_ENCODING,
            });
        Ok(version)
    }

    async fn list_versions(&self, key: &str) -> Result<Vec<MarkerVersion>, GatewayError> {
        Ok(self
            .lock()?
            .get(key)
            .map(|versions| versions.iter().map(|v| v.version.clone()).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_versions_are_append_only_and_ordered() {
        let storage = MemoryStorage::new("http://localhost:9000/oncelink/");
        assert!(!storage.exists("expired/x").await.unwrap());

        let first = storage.put("expired/x", b"{}".to_vec()).await.unwrap();
        let second = storage.put("expired/x", b"{}".to_vec()).await.unwrap();
        assert_ne!(first, second);

        assert!(storage.exists("expired/x").await.unwrap());
        assert_eq!(
            storage.list_versions("expired/x").await.unwrap(),
            vec![first, second]
        );
        assert!(storage.list_versions("expired/y").await.unwrap().is_empty());

        let stored = storage.versions_of("expired/x");
        assert_eq!(stored[0].content_type, "application/json");
        assert_eq!(stored[0].content_encoding, "gzip");
    }

    #[tokio::test]
    async fn test_presign_upload_url_shape() {
        let storage = MemoryStorage::new("http://localhost:9000/oncelink/");
        let a = storage.presign_upload("uploads/cafe", 900).await.unwrap();
        let b = storage.presign_upload("uploads/cafe", 900).await.unwrap();

        let base = "http://localhost:9000/oncelink/uploads/cafe";
        assert!(a.starts_with(&format!("{base}?X-Amz-Expires=900&")));
        // 同じキーでも署名は毎回異なる
        assert_ne!(a, b);
    }
}
