use async_trait::async_trait;
use serde_json::Value;

/// 転送先の候補URL（`{model}` をモデル名に置き換える）
pub const INFERENCE_ENDPOINTS: [&str; 3] = [
    "https://api-inference.huggingface.co/models/{model}",
    "https://router.huggingface.co/hf-inference/{model}",
    "https://router.huggingface.co/models/{model}",
];

pub fn endpoint_url(template: &str, model: &str) -> String {
    template.replace("{model}", model)
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

/// 推論サービスへの送信口
#[async_trait]
pub trait Upstream: Send + Sync {
    /// 通信自体の失敗のみ Err（ステータスは問わない）
    async fn post_json(&self, url: &str, token: &str, body: &Value) -> Result<UpstreamResponse, String>;
}

pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn post_json(&self, url: &str, token: &str, body: &Value) -> Result<UpstreamResponse, String> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| e.to_string())?;
        Ok(UpstreamResponse { status, body })
    }
}
