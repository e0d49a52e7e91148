//! # Gatewayエンドポイント
//!
//! エッジ層からのイベントを受け取り、エッジ層向けの返答を返す。
//! 拒否・失敗はすべて固定の403レスポンスに畳み込み、詳細はログにのみ残す。

pub mod issue;
pub mod validate;

pub use issue::handle_issue;
pub use validate::handle_validate;

use axum::Json;
use oncelink_types::{EdgeReply, EdgeResponse};

/// GET /health — 死活監視。
pub async fn handle_health() -> &'static str {
    "ok"
}

/// 固定の403レスポンス。
pub(crate) fn forbidden() -> Json<EdgeReply> {
    Json(EdgeReply::Respond(EdgeResponse::forbidden()))
}
