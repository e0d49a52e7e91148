//! # Oncelink Gateway
//!
//! 単回利用・期限付きのアップロードリンクを発行し、各リンクの引き換えを
//! 同時実行下でも厳密に1回に制限する。
//!
//! ## 役割
//! - 署名付きアップロードURLの発行と "valid" マーカーの記録
//! - 引き換え時の "expired" マーカー書き込みと、バージョン順による勝者判定
//!
//! ## API エンドポイント
//! - `POST /issue` — リンク発行（エッジイベントを受け取る）
//! - `POST /validate` — 引き換え判定（許可時は元リクエストを素通し）
//! - `GET /health` — 死活監視

mod config;
mod endpoints;
mod error;
mod fingerprint;
mod issuer;
mod marker;
mod storage;
mod validator;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;

use config::{GatewayConfig, GatewayState, SharedState, StorageBackend};
use issuer::LinkIssuer;
use marker::MarkerKeys;
use storage::{MarkerStore, MemoryStorage, UploadSigner};
use validator::LinkValidator;

// ---------------------------------------------------------------------------
// 状態構築
// ---------------------------------------------------------------------------

/// 署名元とマーカーストアから共有状態を組み立てる。
fn build_state(
    config: &GatewayConfig,
    signer: Arc<dyn UploadSigner>,
    store: Arc<dyn MarkerStore>,
) -> SharedState {
    let keys = MarkerKeys::new(&config.marker_prefix);
    Arc::new(GatewayState {
        issuer: LinkIssuer::new(
            signer,
            store.clone(),
            keys.clone(),
            &config.upload_prefix,
            config.presign_expiry_secs,
        ),
        validator: LinkValidator::new(store, keys),
    })
}

/// 設定に従ってストレージを初期化する。
fn init_storage(
    config: &GatewayConfig,
) -> anyhow::Result<(Arc<dyn UploadSigner>, Arc<dyn MarkerStore>)> {
    match config.storage_backend {
        #[cfg(feature = "vendor-aws")]
        StorageBackend::S3 => {
            let storage = Arc::new(storage::S3Storage::from_env()?);
            let signer: Arc<dyn UploadSigner> = storage.clone();
            let store: Arc<dyn MarkerStore> = storage;
            Ok((signer, store))
        }
        #[cfg(not(feature = "vendor-aws"))]
        StorageBackend::S3 => anyhow::bail!("vendor-aws フィーチャーが無効です"),
        StorageBackend::Memory => {
            tracing::warn!("メモリストアで起動します（開発環境用、単一プロセスのみ）");
            let storage = Arc::new(MemoryStorage::new(&config.local_storage_base_url));
            let signer: Arc<dyn UploadSigner> = storage.clone();
            let store: Arc<dyn MarkerStore> = storage;
            Ok((signer, store))
        }
    }
}

fn build_router(state: SharedState) -> axum::Router {
    axum::Router::new()
        .route("/issue", axum::routing::post(endpoints::handle_issue))
        .route("/validate", axum::routing::post(endpoints::handle_validate))
        .route("/health", axum::routing::get(endpoints::handle_health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// エントリポイント
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env()?;
    tracing::info!(
        backend = ?config.storage_backend,
        marker_prefix = %config.marker_prefix,
        presign_expiry_secs = config.presign_expiry_secs,
        "設定を読み込みました"
    );

    let (signer, store) = init_storage(&config)?;
    let app = build_router(build_state(&config, signer, store));

    tracing::info!("Gatewayを {} で起動します", config.listen_addr);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// テスト
// ---------------------------------------------------------------------------
