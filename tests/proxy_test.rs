//! 中継サーバーのハンドラテスト
//!
//! 実際の推論サービスには接続せず、応答を順に返す送信口で
//! 入力検証・転送先の切り替え・エラー応答の形を検証

use async_trait::async_trait;
use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use phototag::proxy::handlers::classify;
use phototag::proxy::{config_script, ProxyState, StaticSecrets, Upstream, UpstreamResponse};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// 用意した応答を順に返し、呼ばれたURLとトークンを記録する
struct ScriptedUpstream {
    replies: Mutex<VecDeque<Result<UpstreamResponse, String>>>,
    calls: Arc<Mutex<Vec<(String, String, Value)>>>,
}

impl ScriptedUpstream {
    fn new(replies: Vec<Result<UpstreamResponse, String>>) -> (Self, Arc<Mutex<Vec<(String, String, Value)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let upstream = Self {
            replies: Mutex::new(replies.into()),
            calls: calls.clone(),
        };
        (upstream, calls)
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn post_json(&self, url: &str, token: &str, body: &Value) -> Result<UpstreamResponse, String> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), token.to_string(), body.clone()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("no more replies".to_string()))
    }
}

fn status(code: u16, body: &str) -> Result<UpstreamResponse, String> {
    Ok(UpstreamResponse {
        status: code,
        body: body.to_string(),
    })
}

fn state_with(
    token: Option<&str>,
    replies: Vec<Result<UpstreamResponse, String>>,
) -> (ProxyState, Arc<Mutex<Vec<(String, String, Value)>>>) {
    let mut secrets = StaticSecrets::new();
    if let Some(token) = token {
        secrets = secrets.with("HF_TOKEN", token);
    }
    let (upstream, calls) = ScriptedUpstream::new(replies);
    (ProxyState::new(Box::new(secrets), Box::new(upstream)), calls)
}

fn request_body(model: &str, image: &str) -> Vec<u8> {
    json!({ "model": model, "imageBase64": image }).to_string().into_bytes()
}

/// model が無いと400、転送しない
#[tokio::test]
async fn test_missing_model_is_bad_request() {
    let (state, calls) = state_with(Some("hf_secret"), vec![status(200, "[]")]);
    let body = json!({ "imageBase64": "AAAA" }).to_string();

    let response = classify(&state, body.as_bytes()).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json_body().unwrap()["error"], "Missing model or imageBase64");
    assert!(calls.lock().unwrap().is_empty());
}

/// 空文字列も欠落として扱う
#[tokio::test]
async fn test_empty_image_is_bad_request() {
    let (state, calls) = state_with(Some("hf_secret"), vec![]);
    let response = classify(&state, &request_body("google/vit-base-patch16-224", "")).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(calls.lock().unwrap().is_empty());
}

/// JSONとして読めない本文は400
#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let (state, _) = state_with(Some("hf_secret"), vec![]);
    let response = classify(&state, b"{model:").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json_body().unwrap()["error"], "Invalid JSON body");
}

/// トークン未設定は500
#[tokio::test]
async fn test_missing_token_is_server_error() {
    let (state, calls) = state_with(None, vec![status(200, "[]")]);
    let response = classify(&state, &request_body("microsoft/resnet-50", "AAAA")).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json_body().unwrap()["error"], "HF_TOKEN not configured");
    assert!(calls.lock().unwrap().is_empty());
}

/// 成功時は本文をそのまま返し、トークンを付けて inputs を送る
#[tokio::test]
async fn test_success_relays_body_verbatim() {
    let upstream_body = r#"[{"label":"tabby cat","score":0.91}]"#;
    let (state, calls) = state_with(Some("hf_secret"), vec![status(200, upstream_body)]);

    let response = classify(&state, &request_body("microsoft/resnet-50", "AAAA")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, upstream_body);
    assert_eq!(response.header(&ACCESS_CONTROL_ALLOW_ORIGIN), Some("*"));
    assert_eq!(response.header(&CONTENT_TYPE), Some("application/json"));

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "https://api-inference.huggingface.co/models/microsoft/resnet-50");
    assert_eq!(calls[0].1, "hf_secret");
    assert_eq!(calls[0].2, json!({ "inputs": "AAAA" }));
}

/// 404なら次の転送先を試す
#[tokio::test]
async fn test_not_found_falls_through_to_next_endpoint() {
    let (state, calls) = state_with(
        Some("hf_secret"),
        vec![status(404, "Not Found"), status(200, r#"[{"label":"dog","score":0.8}]"#)],
    );

    let response = classify(&state, &request_body("google/vit-base-patch16-224", "AAAA")).await;
    assert_eq!(response.status, StatusCode::OK);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1].0,
        "https://router.huggingface.co/hf-inference/google/vit-base-patch16-224"
    );
}

/// すべて404なら試したURLの一覧を返す
#[tokio::test]
async fn test_all_not_found_lists_tried_endpoints() {
    let (state, calls) = state_with(
        Some("hf_secret"),
        vec![status(404, ""), status(404, ""), status(404, "")],
    );

    let response = classify(&state, &request_body("m/x", "AAAA")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(calls.lock().unwrap().len(), 3);

    let body = response.json_body().unwrap();
    assert_eq!(body["status"], 404);
    assert_eq!(body["details"], "All endpoints returned 404");
    assert_eq!(body["triedEndpoints"].as_array().unwrap().len(), 3);
    assert_eq!(body["triedEndpoints"][2], "https://router.huggingface.co/models/m/x");
}

/// 404以外のエラーはそのステータスで返し、次を試さない
#[tokio::test]
async fn test_other_error_status_is_relayed() {
    let (state, calls) = state_with(
        Some("hf_secret"),
        vec![status(503, r#"{"error":"Model is currently loading"}"#), status(200, "[]")],
    );

    let response = classify(&state, &request_body("microsoft/resnet-50", "AAAA")).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(calls.lock().unwrap().len(), 1);

    let body = response.json_body().unwrap();
    assert_eq!(body["error"], "Hugging Face API error");
    assert_eq!(body["status"], 503);
    assert_eq!(body["details"], r#"{"error":"Model is currently loading"}"#);
}

/// どこにも接続できなければ404と同じ形で、最後のエラーを返す
#[tokio::test]
async fn test_unreachable_reports_tried_endpoints() {
    let (state, _) = state_with(
        Some("hf_secret"),
        vec![Err("dns error".into()), Err("dns error".into()), Err("connection refused".into())],
    );

    let response = classify(&state, &request_body("microsoft/resnet-50", "AAAA")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let body = response.json_body().unwrap();
    assert_eq!(body["error"], "Hugging Face API error");
    assert_eq!(body["status"], 404);
    assert_eq!(body["details"], "connection refused");
    assert_eq!(body["triedEndpoints"].as_array().unwrap().len(), 3);
}

/// 設定スクリプトは値をエスケープして埋め込む
#[test]
fn test_config_script_embeds_escaped_secrets() {
    let secrets = StaticSecrets::new()
        .with("HF_TOKEN", "hf_it's")
        .with("GOOGLE_VISION_API_KEY", "AIza\\key");

    let response = config_script(&secrets);
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header(&CONTENT_TYPE),
        Some("application/javascript; charset=utf-8")
    );
    assert_eq!(response.header(&CACHE_CONTROL), Some("public, max-age=3600"));
    assert!(response.body.contains(r"HF_TOKEN: 'hf_it\'s'"));
    assert!(response.body.contains(r"GOOGLE_VISION_API_KEY: 'AIza\\key'"));
}

/// 未設定の値は空文字列になる
#[test]
fn test_config_script_without_secrets() {
    let response = config_script(&StaticSecrets::new());
    assert!(response.body.contains("HF_TOKEN: ''"));
    assert!(response.body.contains("GOOGLE_VISION_API_KEY: ''"));
}
