//! # テスト用共通ヘルパー
//!
//! issuer, validator, endpoints のテストで共有するストレージの代替実装群。

use std::sync::{Arc, Mutex};

use tokio::sync::Barrier;

use crate::error::GatewayError;
use crate::marker::MarkerVersion;
use crate::storage::{MarkerStore, MemoryStorage, UploadSigner};

/// 常に同じURLを返す署名元。
pub struct FixedSigner(pub String);

#[async_trait::async_trait]
impl UploadSigner for FixedSigner {
    async fn presign_upload(
        &self,
        _object_key: &str,
        _expiry_secs: u32,
    ) -> Result<String, GatewayError> {
        Ok(self.0.clone())
    }
}

/// 全操作が失敗するストア。
pub struct FailingStore;

#[async_trait::async_trait]
impl MarkerStore for FailingStore {
    async fn exists(&self, key: &str) -> Result<bool, GatewayError> {
        Err(GatewayError::Storage(format!("HEAD {key}: connection reset")))
    }

    async fn put(&self, key: &str, _body: Vec<u8>) -> Result<MarkerVersion, GatewayError> {
        Err(GatewayError::Storage(format!("PUT {key}: access denied")))
    }

    async fn list_versions(&self, key: &str) -> Result<Vec<MarkerVersion>, GatewayError> {
        Err(GatewayError::Storage(format!("LIST {key}: timeout")))
    }
}

/// 呼び出しを記録しつつメモリストアに委譲するストア。
pub struct RecordingStore {
    inner: Arc<MemoryStorage>,
    reads: Mutex<usize>,
    puts: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn new(inner: Arc<MemoryStorage>) -> Self {
        Self {
            inner,
            reads: Mutex::new(0),
            puts: Mutex::new(Vec::new()),
        }
    }

    /// exists / list_versions の呼び出し回数
    pub fn reads(&self) -> usize {
        *self.reads.lock().unwrap()
    }

    /// put したキーの一覧
    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MarkerStore for RecordingStore {
    async fn exists(&self, key: &str) -> Result<bool, GatewayError> {
        *self.reads.lock().unwrap() += 1;
        self.inner.exists(key).await
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<MarkerVersion, GatewayError> {
        self.puts.lock().unwrap().push(key.to_string());
        self.inner.put(key, body).await
    }

    async fn list_versions(&self, key: &str) -> Result<Vec<MarkerVersion>, GatewayError> {
        *self.reads.lock().unwrap() += 1;
        self.inner.list_versions(key).await
    }
}

/// 全ての競合者が存在確認を終えるまで put を待たせるストア。
///
/// `parties` 個の呼び出しが揃ってから一斉に書き込むため、全員が
/// 「valid あり・expired なし」を観測した状態を確実に作れる。
pub struct GatedStore {
    inner: Arc<MemoryStorage>,
    barrier: Barrier,
}

impl GatedStore {
    pub fn new(inner: Arc<MemoryStorage>, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
        }
    }
}

#[async_trait::async_trait]
impl MarkerStore for GatedStore {
    async fn exists(&self, key: &str) -> Result<bool, GatewayError> {
        self.inner.exists(key).await
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<MarkerVersion, GatewayError> {
        self.barrier.wait().await;
        self.inner.put(key, body).await
    }

    async fn list_versions(&self, key: &str) -> Result<Vec<MarkerVersion>, GatewayError> {
        self.inner.list_versions(key).await
    }
}

/// 2つの exists 呼び出しが揃うまで待たせるストア。
///
/// 存在確認が逐次実行されると1つ目が戻らず、並行実行の場合のみ完了する。
pub struct JoinedExistsStore {
    inner: Arc<MemoryStorage>,
    barrier: Barrier,
}

impl JoinedExistsStore {
    pub fn new(inner: Arc<MemoryStorage>) -> Self {
        Self {
            inner,
            barrier: Barrier::new(2),
        }
    }
}

#[async_trait::async_trait]
impl MarkerStore for JoinedExistsStore {
    async fn exists(&self, key: &str) -> Result<bool, GatewayError> {
        self.barrier.wait().await;
        self.inner.exists(key).await
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<MarkerVersion, GatewayError> {
        self.inner.put(key, body).await
    }

    async fn list_versions(&self, key: &str) -> Result<Vec<MarkerVersion>, GatewayError> {
        self.inner.list_versions(key).await
    }
}

/// 書き込みだけが失敗するストア。
pub struct FailingPutStore(pub Arc<MemoryStorage>);

#[async_trait::async_trait]
impl MarkerStore for FailingPutStore {
    async fn exists(&self, key: &str) -> Result<bool, GatewayError> {
        self.0.exists(key).await
    }

    async fn put(&self, key: &str, _body: Vec<u8>) -> Result<MarkerVersion, GatewayError> {
        Err(GatewayError::Storage(format!("PUT {key}: slow down")))
    }

    async fn list_versions(&self, key: &str) -> Result<Vec<MarkerVersion>, GatewayError> {
        self.0.list_versions(key).await
    }
}

/// 一覧が直前の書き込みを反映しない（結果整合性の）ストア。
pub struct StaleListStore(pub Arc<MemoryStorage>);

#[async_trait::async_trait]
impl MarkerStore for StaleListStore {
    async fn exists(&self, key: &str) -> Result<bool, GatewayError> {
        self.0.exists(key).await
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<MarkerVersion, GatewayError> {
        self.0.put(key, body).await
    }

    async fn list_versions(&self, _key: &str) -> Result<Vec<MarkerVersion>, GatewayError> {
        Ok(Vec::new())
    }
}
