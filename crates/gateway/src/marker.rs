//! # マーカー
//!
//! リンクの状態をバージョン付きストアのオブジェクトとして記録する。
//! キーは `{prefix}{state}/{fingerprint}`、状態遷移は absent → valid → expired のみ。

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use oncelink_types::MarkerBody;

use crate::error::GatewayError;
use crate::fingerprint::Fingerprint;

/// マーカー本体のContent-Type。
pub const MARKER_CONTENT_TYPE: &str = "application/json";

/// マーカー本体のContent-Encoding。ラベルのみで本体は圧縮しない。
pub const MARKER_CONTENT_ENCODING: &str = "gzip";

/// マーカーの状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    /// 発行済み・未使用
    Valid,
    /// 使用済み（終端状態）
    Expired,
}

impl MarkerState {
    fn as_str(self) -> &'static str {
        match self {
            MarkerState::Valid => "valid",
            MarkerState::Expired => "expired",
        }
    }
}

/// ストアが書き込みごとに割り当てる不透明なバージョンID。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkerVersion(String);

impl MarkerVersion {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for MarkerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// マーカーキーの組み立て規則。
#[derive(Debug, Clone, Default)]
pub struct MarkerKeys {
    prefix: String,
}

impl MarkerKeys {
    /// キー接頭辞を指定して構築する。空でなければ末尾に `/` を補う。
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };
        Self { prefix }
    }

    pub fn key(&self, state: MarkerState, fingerprint: &Fingerprint) -> String {
        format!("{}{}/{}", self.prefix, state.as_str(), fingerprint)
    }

    pub fn valid(&self, fingerprint: &Fingerprint) -> String {
        self.key(MarkerState::Valid, fingerprint)
    }

    pub fn expired(&self, fingerprint: &Fingerprint) -> String {
        self.key(MarkerState::Expired, fingerprint)
    }
}

/// 現在時刻でマーカー本体を生成し、JSONバイト列にする。
pub fn marker_body_now() -> Result<Vec<u8>, GatewayError> {
    let created = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| GatewayError::Internal(format!("時刻取得失敗: {e}")))?
        .as_millis();
    let created = u64::try_from(created)
        .map_err(|e| GatewayError::Internal(format!("時刻の変換に失敗: {e}")))?;

    serde_json::to_vec(&MarkerBody { created })
        .map_err(|e| GatewayError::Internal(format!("マーカーのシリアライズに失敗: {e}")))
}
