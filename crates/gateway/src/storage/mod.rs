//! # マーカーストレージ
//!
//! リンクのマーカーを保持するバージョン付きオブジェクトストアと、
//! アップロード用署名付きURLの発行元を抽象化するインターフェース。
//!
//! ## 実装
//! - `s3`: S3互換ストレージ（AWS S3, MinIO 等。バケットのバージョニング有効化が必須）
//! - `memory`: プロセス内ストア（ローカル開発・テスト用）

#[cfg(feature = "vendor-aws")]
pub mod s3;
pub mod memory;

#[cfg(feature = "vendor-aws")]
pub use s3::S3Storage;
pub use memory::MemoryStorage;

use crate::error::GatewayError;
use crate::marker::MarkerVersion;

/// アップロード用の署名付きURL（PUT）の発行元。
#[async_trait::async_trait]
pub trait UploadSigner: Send + Sync {
    /// `object_key` へのPUTを `expiry_secs` 秒間だけ許可する署名付きURLを生成する。
    async fn presign_upload(&self, object_key: &str, expiry_secs: u32)
        -> Result<String, GatewayError>;
}

/// 追記専用・バージョン付きのマーカーストア。
///
/// 同一キーへの書き込みは上書きではなく新しいバージョンを作る。
/// `list_versions` は自身の直前の書き込みを必ず含む（read-after-write一貫性）こと。
#[async_trait::async_trait]
pub trait MarkerStore: Send + Sync {
    /// キーが存在するかを返す。不在はエラーではなく `false`。
    async fn exists(&self, key: &str) -> Result<bool, GatewayError>;

    /// マーカー本体を書き込み、割り当てられたバージョンを返す。
    ///
    /// Content-Type は `application/json`、Content-Encoding は `gzip` で保存する。
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<MarkerVersion, GatewayError>;

    /// キーの全バージョンを作成順（古い順）で返す。
    async fn list_versions(&self, key: &str) -> Result<Vec<MarkerVersion>, GatewayError>;
}
