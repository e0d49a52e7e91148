//! # Oncelink 共有型定義
//!
//! エッジ層（CloudFront Lambda@Edge 互換）とやり取りするイベント・レスポンスと、
//! ストレージに書き込むマーカー本体をRust構造体として提供する。
//!
//! ## エンコーディング規則
//! - ステータスコードは文字列（"200", "403"）
//! - ヘッダは小文字名 → `{key, value}` のリスト

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// エッジイベント
// ---------------------------------------------------------------------------

/// エッジ層から渡される呼び出しイベント。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeEvent {
    /// イベントレコード（先頭のみ使用する）
    #[serde(rename = "Records")]
    pub records: Vec<EdgeRecord>,
}

impl EdgeEvent {
    /// 単一リクエストを包んだイベントを構築する。
    pub fn single(request: EdgeRequest) -> Self {
        Self {
            records: vec![EdgeRecord {
                cf: EdgeRecordBody { request },
            }],
        }
    }

    /// 先頭レコードのリクエストを取り出す。
    pub fn into_request(self) -> Option<EdgeRequest> {
        self.records.into_iter().next().map(|r| r.cf.request)
    }
}

/// イベントレコード。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// CloudFront固有部分
    pub cf: EdgeRecordBody,
}

/// レコード本体。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecordBody {
    /// 受信リクエスト
    pub request: EdgeRequest,
}

/// ヘッダの1エントリ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    /// 元の大文字小文字を保ったヘッダ名
    pub key: String,
    /// ヘッダ値
    pub value: String,
}

impl HeaderEntry {
    fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// ヘッダマップ（小文字名 → エントリ列）。
pub type Headers = BTreeMap<String, Vec<HeaderEntry>>;

/// エッジ層が受け取ったリクエスト記述子。
///
/// 検証に成功した場合はそのまま返却するため、未知のフィールドも
/// `extra` に保持して往復で失わないようにする。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRequest {
    /// HTTPメソッド
    pub method: String,
    /// パス（先頭の `/` を含む）
    pub uri: String,
    /// `?` を含まないクエリ文字列
    #[serde(default)]
    pub querystring: String,
    /// リクエストヘッダ
    #[serde(default)]
    pub headers: Headers,
    /// その他のフィールド（clientIp 等）
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EdgeRequest {
    /// `host` ヘッダの値を返す。
    pub fn host(&self) -> Option<&str> {
        self.headers
            .get("host")
            .and_then(|entries| entries.first())
            .map(|entry| entry.value.as_str())
    }
}

// ---------------------------------------------------------------------------
// エッジレスポンス
// ---------------------------------------------------------------------------

/// エッジ層で生成するレスポンス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeResponse {
    /// ステータスコード（文字列）
    pub status: String,
    /// ステータス説明
    pub status_description: String,
    /// レスポンスヘッダ
    pub headers: Headers,
    /// 本文
    pub body: String,
}

impl EdgeResponse {
    fn text(status: &str, description: &str, body: String) -> Self {
        let mut headers = Headers::new();
        headers.insert(
            "content-type".to_string(),
            vec![HeaderEntry::new("Content-Type", "text/plain")],
        );
        headers.insert(
            "content-encoding".to_string(),
            vec![HeaderEntry::new("Content-Encoding", "UTF-8")],
        );
        Self {
            status: status.to_string(),
            status_description: description.to_string(),
            headers,
            body,
        }
    }

    /// テキスト本文の200レスポンス。
    pub fn ok(body: String) -> Self {
        Self::text("200", "OK", body)
    }

    /// 拒否時の固定レスポンス。内部状態は一切含めない。
    pub fn forbidden() -> Self {
        Self::text("403", "Forbidden", "Forbidden".to_string())
    }
}

/// エッジ層への返答。生成したレスポンスか、元のリクエストの素通しのいずれか。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgeReply {
    /// エッジ層で応答する
    Respond(EdgeResponse),
    /// 元のリクエストを後段に流す
    Forward(EdgeRequest),
}

// ---------------------------------------------------------------------------
// マーカー本体
// ---------------------------------------------------------------------------

/// マーカーオブジェクトの本体。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerBody {
    /// 作成時刻（UNIXエポックからのミリ秒）
    pub created: u64,
}
