//! 推論サービスへのリクエスト転送
//!
//! - ProxyForwarder: プロキシへ `{model, imageBase64}` をPOST（トークンはプロキシ側）
//! - DirectForwarder: 推論サービスへ直接POST（トークンがあればBearer認証）

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

/// 推論サービスの直接呼び出し先
pub const INFERENCE_BASE_URL: &str = "https://api-inference.huggingface.co/models";

/// クロスオリジン遮断とみなすエラーメッセージの目印
const BLOCK_MARKERS: [&str; 3] = ["CORS", "Failed to fetch", "ERR_FAILED"];

/// 転送先からの応答（ステータスに関わらず本文を保持）
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardResponse {
    pub status: u16,
    pub body: String,
}

impl ForwardResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Error, Debug)]
pub enum ForwardError {
    /// 接続拒否・クロスオリジン遮断
    #[error("転送先に到達できません: {0}")]
    Blocked(String),

    #[error("転送エラー: {0}")]
    Transport(String),
}

impl ForwardError {
    /// メッセージから遮断かどうかを判定して分類する
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if BLOCK_MARKERS.iter().any(|m| message.contains(m)) {
            ForwardError::Blocked(message)
        } else {
            ForwardError::Transport(message)
        }
    }

    pub fn is_cross_origin_block(&self) -> bool {
        matches!(self, ForwardError::Blocked(_))
    }
}

impl From<reqwest::Error> for ForwardError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            ForwardError::Blocked(e.to_string())
        } else {
            ForwardError::from_message(e.to_string())
        }
    }
}

#[async_trait]
pub trait Forwarder: Send + Sync {
    /// `image_base64` はData URLの接頭辞を除いたペイロード
    async fn classify(&self, model: &str, image_base64: &str) -> Result<ForwardResponse, ForwardError>;
}

pub struct ProxyForwarder {
    client: reqwest::Client,
    proxy_url: String,
}

impl ProxyForwarder {
    pub fn new(client: reqwest::Client, proxy_url: impl Into<String>) -> Self {
        Self {
            client,
            proxy_url: proxy_url.into(),
        }
    }
}

#[async_trait]
impl Forwarder for ProxyForwarder {
    async fn classify(&self, model: &str, image_base64: &str) -> Result<ForwardResponse, ForwardError> {
        let response = self
            .client
            .post(&self.proxy_url)
            .json(&json!({
                "model": model,
                "imageBase64": image_base64,
            }))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ForwardResponse { status, body })
    }
}

pub struct DirectForwarder {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl DirectForwarder {
    pub fn new(client: reqwest::Client, token: Option<String>) -> Self {
        Self::with_base_url(client, INFERENCE_BASE_URL, token)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token,
        }
    }
}

#[async_trait]
impl Forwarder for DirectForwarder {
    async fn classify(&self, model: &str, image_base64: &str) -> Result<ForwardResponse, ForwardError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), model);
        let mut request = self.client.post(&url).json(&json!({ "inputs": image_base64 }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ForwardResponse { status, body })
    }
}
