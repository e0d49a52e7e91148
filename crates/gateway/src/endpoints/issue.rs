//! # POST /issue
//!
//! 単回利用アップロードリンクの発行。

use axum::extract::State;
use axum::Json;
use oncelink_types::{EdgeEvent, EdgeReply, EdgeResponse};

use super::forbidden;
use crate::config::SharedState;

/// POST /issue — リンク発行。
///
/// リクエストの `host` ヘッダを使って `https://{host}{path}?{query}` を本文で返す。
/// "valid" マーカーを書けなかった場合はURLを返さず403とする。
pub async fn handle_issue(
    State(state): State<SharedState>,
    Json(event): Json<EdgeEvent>,
) -> Json<EdgeReply> {
    let Some(request) = event.into_request() else {
        tracing::warn!("レコードを含まないイベントを拒否");
        return forbidden();
    };
    let Some(host) = request.host() else {
        tracing::warn!("hostヘッダの無いリクエストを拒否");
        return forbidden();
    };

    match state.issuer.issue(host).await {
        Ok(link) => {
            tracing::debug!(
                fingerprint = %link.fingerprint,
                object_key = %link.object_key,
                "発行したURLを返却"
            );
            Json(EdgeReply::Respond(EdgeResponse::ok(link.url)))
        }
        Err(e) => {
            tracing::error!(error = %e, "リンク発行に失敗");
            forbidden()
        }
    }
}
