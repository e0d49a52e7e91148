//! # リンク検証
//!
//! 署名付きURLによるPUTを1回だけ通す。ストアには排他的な書き込みが無いため、
//! "expired" マーカーを書いた後にそのキーのバージョン一覧を取り、
//! 自分の書き込みが最古であった呼び出しだけを勝者とする。
//!
//! ## 状態遷移（フィンガープリントごと）
//! 1. PUT以外は即拒否（ストレージにアクセスしない）
//! 2. `uri?querystring` からフィンガープリントを計算
//! 3. valid / expired の存在を並行に確認
//! 4. "expired" マーカーを書き込む（3を通過した全員が書く）
//! 5. バージョン一覧の先頭が自分なら許可、それ以外は拒否

use std::fmt;
use std::sync::Arc;

use oncelink_types::EdgeRequest;

use crate::error::GatewayError;
use crate::fingerprint::Fingerprint;
use crate::marker::{marker_body_now, MarkerKeys, MarkerVersion};
use crate::storage::MarkerStore;

/// 引き換えを許可するHTTPメソッド。
pub const REDEEM_METHOD: &str = "PUT";

/// 拒否理由。レスポンスには出さず、ログにのみ記録する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// PUT以外のメソッド
    Method,
    /// "valid" マーカーが無い（未発行、またはフィンガープリント不一致）
    NotIssued,
    /// 既に "expired" マーカーがある
    AlreadyRedeemed,
    /// 競合で最古の書き込みになれなかった
    LostRace,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenyReason::Method => "method",
            DenyReason::NotIssued => "not_issued",
            DenyReason::AlreadyRedeemed => "already_redeemed",
            DenyReason::LostRace => "lost_race",
        };
        f.write_str(s)
    }
}

/// 検証結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// 引き換えを許可。`version` は勝者となった "expired" マーカーのバージョン。
    Allow {
        fingerprint: Fingerprint,
        version: MarkerVersion,
    },
    /// 拒否
    Deny(DenyReason),
}

/// 単回利用リンクの引き換えを判定する。
pub struct LinkValidator {
    store: Arc<dyn MarkerStore>,
    keys: MarkerKeys,
}

impl LinkValidator {
    pub fn new(store: Arc<dyn MarkerStore>, keys: MarkerKeys) -> Self {
        Self { store, keys }
    }

    /// リクエストを判定する。
    ///
    /// ストレージエラーと整合性違反は `Err` で返る。呼び出し側は拒否として扱うこと。
    pub async fn validate(&self, request: &EdgeRequest) -> Result<Verdict, GatewayError> {
        if request.method != REDEEM_METHOD {
            tracing::debug!(method = %request.method, "書き込み以外のメソッドを拒否");
            return Ok(Verdict::Deny(DenyReason::Method));
        }

        let fingerprint = Fingerprint::of_request(&request.uri, &request.querystring);
        let valid_key = self.keys.valid(&fingerprint);
        let expired_key = self.keys.expired(&fingerprint);

        let (issued, redeemed) = tokio::try_join!(
            self.store.exists(&valid_key),
            self.store.exists(&expired_key),
        )?;

        if !issued {
            tracing::info!(fingerprint = %fingerprint, "未発行のリンクを拒否");
            return Ok(Verdict::Deny(DenyReason::NotIssued));
        }
        if redeemed {
            tracing::info!(fingerprint = %fingerprint, "使用済みのリンクを拒否");
            return Ok(Verdict::Deny(DenyReason::AlreadyRedeemed));
        }

        let own = self.store.put(&expired_key, marker_body_now()?).await?;
        let versions = self.store.list_versions(&expired_key).await?;

        if resolve_race(&own, &versions)? {
            tracing::info!(fingerprint = %fingerprint, version = %own, "リンクの引き換えを許可");
            return Ok(Verdict::Allow {
                fingerprint,
                version: own,
            });
        }

        // 敗者の書き込みは同一キーの追加バージョンとして残す
        tracing::info!(
            fingerprint = %fingerprint,
            version = %own,
            winner = %versions[0],
            "競合に敗れたため拒否"
        );
        Ok(Verdict::Deny(DenyReason::LostRace))
    }
}

/// 自分のバージョンが最古なら `true`。一覧に自分が無ければ整合性違反。
fn resolve_race(own: &MarkerVersion, versions: &[MarkerVersion]) -> Result<bool, GatewayError> {
    if !versions.contains(own) {
        return Err(GatewayError::Consistency(format!(
            "書き込んだバージョン {own} が一覧に存在しません（{}件）",
            versions.len()
        )));
    }
    Ok(versions.first() == Some(own))
}
