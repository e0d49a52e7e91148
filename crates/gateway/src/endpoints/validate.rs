//! # POST /validate
//!
//! 署名付きURLによる書き込みの引き換え判定。

use axum::extract::State;
use axum::Json;
use oncelink_types::{EdgeEvent, EdgeReply};

use super::forbidden;
use crate::config::SharedState;
use crate::error::GatewayError;
use crate::validator::Verdict;

/// POST /validate — 引き換え判定。
///
/// 許可なら元のリクエストをそのまま返し、後段で実際の書き込みを行わせる。
pub async fn handle_validate(
    State(state): State<SharedState>,
    Json(event): Json<EdgeEvent>,
) -> Json<EdgeReply> {
    let Some(request) = event.into_request() else {
        tracing::warn!("レコードを含まないイベントを拒否");
        return forbidden();
    };

    match state.validator.validate(&request).await {
        Ok(Verdict::Allow {
            fingerprint,
            version,
        }) => {
            tracing::debug!(fingerprint = %fingerprint, version = %version, "リクエストを素通し");
            Json(EdgeReply::Forward(request))
        }
        Ok(Verdict::Deny(reason)) => {
            tracing::debug!(reason = %reason, uri = %request.uri, "引き換えを拒否");
            forbidden()
        }
        Err(GatewayError::Consistency(msg)) => {
            tracing::warn!(uri = %request.uri, "勝者を判定できないため拒否: {msg}");
            forbidden()
        }
        Err(e) => {
            tracing::error!(error = %e, uri = %request.uri, "引き換え判定に失敗");
            forbidden()
        }
    }
}
