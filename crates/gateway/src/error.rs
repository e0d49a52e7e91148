//! # Gateway エラー型
//!
//! マーカー不在（NotFound）はエラーではなく `exists() == false` として扱うため、
//! ここには含まれない。

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// ストレージ操作に失敗（通信・権限・プロバイダエラー）
    #[error("ストレージ操作に失敗: {0}")]
    Storage(String),
    /// バージョン一覧が書き込み結果と矛盾している
    #[error("バージョン一覧の整合性違反: {0}")]
    Consistency(String),
    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
}
