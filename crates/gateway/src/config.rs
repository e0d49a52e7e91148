//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。

use std::sync::Arc;

use crate::issuer::LinkIssuer;
use crate::validator::LinkValidator;

/// 署名付きURLの有効期限の上限（SigV4の上限と同じ7日）。
const MAX_PRESIGN_EXPIRY_SECS: u32 = 7 * 24 * 60 * 60;

/// マーカーストアの種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// S3互換ストレージ
    S3,
    /// プロセス内ストア（開発用）
    Memory,
}

/// 起動時に読み込むGateway設定。
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// 待ち受けアドレス
    pub listen_addr: String,
    /// マーカーストアの種別
    pub storage_backend: StorageBackend,
    /// マーカーキーの接頭辞（空なら `valid/…`, `expired/…`）
    pub marker_prefix: String,
    /// アップロード先オブジェクトキーの接頭辞
    pub upload_prefix: String,
    /// 署名付きURLの有効期限（秒）
    pub presign_expiry_secs: u32,
    /// メモリストアが発行するURLのベース
    pub local_storage_base_url: String,
}

impl GatewayConfig {
    /// 環境変数から読み込む。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の参照関数から読み込む。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let storage_backend = match lookup("STORAGE_BACKEND").as_deref() {
            None => default_backend(),
            Some("s3") => StorageBackend::S3,
            Some("memory") => StorageBackend::Memory,
            Some(other) => anyhow::bail!(
                "STORAGE_BACKENDは \"s3\" または \"memory\" である必要があります: {other}"
            ),
        };
        if storage_backend == StorageBackend::S3 && !cfg!(feature = "vendor-aws") {
            anyhow::bail!("STORAGE_BACKEND=s3 には vendor-aws フィーチャーが必要です");
        }

        let presign_expiry_secs = match lookup("PRESIGN_EXPIRY_SECS") {
            Some(raw) => {
                let secs: u32 = raw.trim().parse().map_err(|e| {
                    anyhow::anyhow!("PRESIGN_EXPIRY_SECSが不正です: {raw} ({e})")
                })?;
                if secs == 0 || secs > MAX_PRESIGN_EXPIRY_SECS {
                    anyhow::bail!(
                        "PRESIGN_EXPIRY_SECSは1〜{MAX_PRESIGN_EXPIRY_SECS}の範囲である必要があります: {secs}"
                    );
                }
                secs
            }
            None => 900,
        };

        let upload_prefix = lookup("UPLOAD_PREFIX")
            .map(|p| p.trim_matches('/').to_string())
            .unwrap_or_else(|| "uploads".to_string());
        if upload_prefix.is_empty() {
            anyhow::bail!("UPLOAD_PREFIXは空にできません");
        }

        Ok(Self {
            listen_addr: lookup("GATEWAY_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            storage_backend,
            marker_prefix: lookup("MARKER_PREFIX").unwrap_or_default(),
            upload_prefix,
            presign_expiry_secs,
            local_storage_base_url: lookup("LOCAL_STORAGE_BASE_URL")
                .unwrap_or_else(|| "http://localhost:9000/oncelink".to_string()),
        })
    }
}

fn default_backend() -> StorageBackend {
    if cfg!(feature = "vendor-aws") {
        StorageBackend::S3
    } else {
        StorageBackend::Memory
    }
}

/// Gatewayの共有状態。
pub struct GatewayState {
    /// リンク発行
    pub issuer: LinkIssuer,
    /// リンク検証
    pub validator: LinkValidator,
}

/// 共有状態のハンドル。
pub type SharedState = Arc<GatewayState>;
