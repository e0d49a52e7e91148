//! # リンクのフィンガープリント
//!
//! 発行側と検証側で同じ規則を使う: `SHA-256(path + "?" + querystring)` の小文字hex。
//! クエリには署名（`X-Amz-Signature`）が含まれるため、同じオブジェクトキーでも
//! 発行ごとに異なる値になる。

use std::fmt;

use sha2::{Digest, Sha256};

/// 1つの引き換えリンクを識別するダイジェスト。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// パスとクエリ文字列（`?` を含まない）からフィンガープリントを計算する。
    pub fn of_request(path: &str, querystring: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(path.as_bytes());
        hasher.update(b"?");
        hasher.update(querystring.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
