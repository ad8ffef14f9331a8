//! 推論サービス用の中継サーバー
//!
//! - `POST /`, `POST /api/huggingface`: 分類リクエストをトークン付きで転送
//! - `OPTIONS` 同パス: CORSプリフライト
//! - `GET /config.js`: 秘密情報を埋め込んだ設定スクリプト

pub mod handlers;
pub mod secrets;
pub mod upstream;

pub use handlers::{config_script, escape_script_string, preflight, ProxyResponse};
pub use secrets::{EnvSecrets, SecretSource, StaticSecrets};
pub use upstream::{HttpUpstream, Upstream, UpstreamResponse, INFERENCE_ENDPOINTS};

use crate::config::Config;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post, MethodRouter};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;

/// リクエスト本文の上限（10MiB）
pub const BODY_LIMIT: usize = 10 * 1024 * 1024;

pub struct ProxyState {
    pub secrets: Box<dyn SecretSource>,
    pub upstream: Box<dyn Upstream>,
    /// `{model}` を含む転送先URLの候補（この順に試す）
    pub endpoints: Vec<String>,
}

impl ProxyState {
    pub fn new(secrets: Box<dyn SecretSource>, upstream: Box<dyn Upstream>) -> Self {
        Self {
            secrets,
            upstream,
            endpoints: INFERENCE_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

async fn classify_handler(State(state): State<Arc<ProxyState>>, body: Bytes) -> ProxyResponse {
    handlers::classify(&state, &body).await
}

async fn preflight_handler() -> ProxyResponse {
    handlers::preflight()
}

async fn method_not_allowed_handler() -> ProxyResponse {
    handlers::method_not_allowed()
}

async fn config_handler(State(state): State<Arc<ProxyState>>) -> ProxyResponse {
    handlers::config_script(state.secrets.as_ref())
}

fn classify_route() -> MethodRouter<Arc<ProxyState>> {
    post(classify_handler)
        .options(preflight_handler)
        .fallback(method_not_allowed_handler)
}

/// ルーターを構築
pub fn create_app(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route("/", classify_route())
        .route("/api/huggingface", classify_route())
        .route("/config.js", get(config_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .with_state(state)
}

/// 設定に従ってサーバーを起動
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()?;

    // 環境変数を優先し、なければ設定ファイルの値
    let secret_source = EnvSecrets::new()
        .with_fallback(secrets::HF_TOKEN, config.hf_token.clone())
        .with_fallback(secrets::GOOGLE_VISION_API_KEY, config.vision_api_key.clone());
    if secret_source.get(secrets::HF_TOKEN).is_none() {
        log::warn!("HF_TOKEN が未設定です。分類リクエストは500を返します");
    }

    let state = Arc::new(ProxyState::new(Box::new(secret_source), Box::new(HttpUpstream::new(client))));
    let app = create_app(state);

    log::info!("中継サーバー起動: http://{}", config.bind);
    let listener = TcpListener::bind(&config.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
