//! プロキシの各エンドポイント
//!
//! 状態を持たない。秘密情報はリクエストごとに `SecretSource` から読む。

use super::secrets::{SecretSource, GOOGLE_VISION_API_KEY, HF_TOKEN};
use super::upstream::endpoint_url;
use super::ProxyState;
use axum::http::header::{HeaderName, ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

const JSON_CONTENT_TYPE: &str = "application/json";
const SCRIPT_CONTENT_TYPE: &str = "application/javascript; charset=utf-8";
const PREFLIGHT_MAX_AGE: &str = "86400";
const SCRIPT_CACHE_CONTROL: &str = "public, max-age=3600";

/// ハンドラの応答（フレームワーク非依存で検査できる形）
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, &'static str)>,
    pub body: String,
}

impl ProxyResponse {
    fn json(status: StatusCode, body: String) -> Self {
        Self {
            status,
            headers: vec![(CONTENT_TYPE, JSON_CONTENT_TYPE), (ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
            body,
        }
    }

    fn error(status: StatusCode, value: Value) -> Self {
        Self::json(status, value.to_string())
    }

    pub fn header(&self, name: &HeaderName) -> Option<&'static str> {
        self.headers.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    /// 本文をJSONとして読む（テスト・ログ用）
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        for (name, value) in self.headers {
            response.headers_mut().insert(name, HeaderValue::from_static(value));
        }
        response
    }
}

/// 分類リクエストを推論サービスへ転送する
///
/// # Arguments
/// * `body` - `{ "model": ..., "imageBase64": ... }` のJSON
///
/// # Returns
/// 成功時は推論サービスの本文をそのまま、失敗時は `{error, status?, details?}`
pub async fn classify(state: &ProxyState, body: &[u8]) -> ProxyResponse {
    let Some(token) = state.secrets.get(HF_TOKEN) else {
        log::error!("HF_TOKEN が設定されていません");
        return ProxyResponse::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "HF_TOKEN not configured" }),
        );
    };

    let request: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            return ProxyResponse::error(
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid JSON body", "details": e.to_string() }),
            )
        }
    };

    let (Some(model), Some(image_base64)) = (string_field(&request, "model"), string_field(&request, "imageBase64")) else {
        return ProxyResponse::error(
            StatusCode::BAD_REQUEST,
            json!({ "error": "Missing model or imageBase64" }),
        );
    };

    forward(state, &token, model, image_base64).await
}

fn string_field<'a>(value: &'a Value, name: &str) -> Option<&'a str> {
    value.get(name).and_then(Value::as_str).filter(|v| !v.is_empty())
}

async fn forward(state: &ProxyState, token: &str, model: &str, image_base64: &str) -> ProxyResponse {
    let payload = json!({ "inputs": image_base64 });
    let tried: Vec<String> = state.endpoints.iter().map(|t| endpoint_url(t, model)).collect();

    let mut chosen = None;
    let mut last_error: Option<String> = None;

    for url in &tried {
        match state.upstream.post_json(url, token, &payload).await {
            Ok(response) if response.status == 404 => {
                log::debug!("404: {}", url);
                last_error = Some(response.body);
            }
            Ok(response) => {
                chosen = Some(response);
                break;
            }
            Err(e) => {
                log::warn!("転送失敗 {}: {}", url, e);
                last_error = Some(e);
            }
        }
    }

    // 到達できなかった場合も404と同じ扱い
    let Some(response) = chosen else {
        return ProxyResponse::error(
            StatusCode::NOT_FOUND,
            json!({
                "error": "Hugging Face API error",
                "status": 404,
                "details": last_error.filter(|e| !e.is_empty()).unwrap_or_else(|| "All endpoints returned 404".into()),
                "triedEndpoints": tried,
            }),
        );
    };

    if !(200..300).contains(&response.status) {
        log::info!("推論サービスエラー (status {}) model={}", response.status, model);
        let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
        return ProxyResponse::error(
            status,
            json!({
                "error": "Hugging Face API error",
                "status": response.status,
                "details": response.body,
            }),
        );
    }

    ProxyResponse::json(StatusCode::OK, response.body)
}

/// CORSプリフライト（常に許可）
pub fn preflight() -> ProxyResponse {
    ProxyResponse {
        status: StatusCode::OK,
        headers: vec![
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (HeaderName::from_static("access-control-allow-methods"), "POST, OPTIONS"),
            (HeaderName::from_static("access-control-allow-headers"), "Content-Type"),
            (HeaderName::from_static("access-control-max-age"), PREFLIGHT_MAX_AGE),
        ],
        body: String::new(),
    }
}

pub fn method_not_allowed() -> ProxyResponse {
    ProxyResponse {
        status: StatusCode::METHOD_NOT_ALLOWED,
        headers: Vec::new(),
        body: "Method not allowed".into(),
    }
}

/// 2つの秘密情報をグローバル定数として公開するスクリプト
pub fn config_script(secrets: &dyn SecretSource) -> ProxyResponse {
    let vision_key = secrets.get(GOOGLE_VISION_API_KEY).unwrap_or_default();
    let hf_token = secrets.get(HF_TOKEN).unwrap_or_default();

    let body = format!(
        "const CONFIG = {{\n    GOOGLE_VISION_API_KEY: {},\n    HF_TOKEN: {}\n}};\n\n\
         if (CONFIG.HF_TOKEN) {{\n    window.HF_TOKEN = CONFIG.HF_TOKEN;\n}}\n\n\
         if (CONFIG.GOOGLE_VISION_API_KEY) {{\n    window.GOOGLE_VISION_API_KEY = CONFIG.GOOGLE_VISION_API_KEY;\n}}\n",
        escape_script_string(&vision_key),
        escape_script_string(&hf_token),
    );

    ProxyResponse {
        status: StatusCode::OK,
        headers: vec![(CONTENT_TYPE, SCRIPT_CONTENT_TYPE), (CACHE_CONTROL, SCRIPT_CACHE_CONTROL)],
        body,
    }
}

/// 単引用符の文字列リテラルにする（\ ' 改行をエスケープ）
pub fn escape_script_string(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n");
    format!("'{}'", escaped)
}
