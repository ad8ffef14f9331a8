//! 汎用画像解析サービス（Vision API）によるキーワード取得
//!
//! ラベル・ランドマーク・文字・物体の検出を1回のリクエストで行う。

use super::{KeywordRequest, KeywordSource};
use crate::error::{PhotoTagError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;

pub const VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// ラベルを採用する信頼度の下限（これより大きいもののみ）
const MIN_LABEL_SCORE: f64 = 0.7;
/// 検出文字から採用する単語数
const MAX_TEXT_WORDS: usize = 5;
/// 採用する単語の最短文字数（これより長いもののみ）
const MIN_TEXT_WORD_CHARS: usize = 3;

#[derive(Debug, Default, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AnnotateResult {
    label_annotations: Vec<EntityAnnotation>,
    landmark_annotations: Vec<EntityAnnotation>,
    localized_object_annotations: Vec<ObjectAnnotation>,
    text_annotations: Vec<EntityAnnotation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EntityAnnotation {
    description: String,
    score: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ObjectAnnotation {
    name: String,
}

pub struct VisionSource {
    client: reqwest::Client,
    endpoint: String,
}

impl VisionSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoint(client, VISION_ENDPOINT)
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    async fn annotate(&self, api_key: &str, payload: &str) -> Result<Vec<String>> {
        let body = json!({
            "requests": [{
                "image": { "content": payload },
                "features": [
                    { "type": "LABEL_DETECTION", "maxResults": 10 },
                    { "type": "LANDMARK_DETECTION", "maxResults": 5 },
                    { "type": "TEXT_DETECTION" },
                    { "type": "OBJECT_LOCALIZATION", "maxResults": 10 }
                ]
            }]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(PhotoTagError::Upstream {
                status: status.as_u16(),
                details: text,
            });
        }

        parse_annotations(&text)
    }
}

/// 応答JSONからキーワードを取り出す
///
/// ラベル（信頼度0.7超）→ ランドマーク → 物体 → 文字の順。すべて小文字化して重複除去。
pub fn parse_annotations(body: &str) -> Result<Vec<String>> {
    let response: AnnotateResponse = serde_json::from_str(body)?;
    let Some(result) = response.responses.into_iter().next() else {
        return Ok(Vec::new());
    };

    let labels = result
        .label_annotations
        .into_iter()
        .filter(|l| l.score > MIN_LABEL_SCORE)
        .map(|l| l.description);
    let landmarks = result.landmark_annotations.into_iter().map(|l| l.description);
    let objects = result.localized_object_annotations.into_iter().map(|o| o.name);

    // 先頭の注釈が検出文字全体
    let words = result
        .text_annotations
        .first()
        .map(|t| text_words(&t.description))
        .unwrap_or_default();

    let mut seen = HashSet::new();
    Ok(labels
        .chain(landmarks)
        .chain(objects)
        .chain(words)
        .map(|k| k.to_lowercase())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect())
}

fn text_words(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split_whitespace()
        .filter(|w| w.chars().count() > MIN_TEXT_WORD_CHARS)
        .map(str::to_lowercase)
        .filter(|w| seen.insert(w.clone()))
        .take(MAX_TEXT_WORDS)
        .collect()
}

#[async_trait]
impl KeywordSource for VisionSource {
    fn name(&self) -> &'static str {
        "vision"
    }

    async fn keywords(&self, request: &KeywordRequest<'_>) -> Vec<String> {
        let Some(api_key) = request.vision_api_key.filter(|k| !k.is_empty()) else {
            log::warn!("Vision APIキーが未設定のためスキップ");
            return Vec::new();
        };

        match self.annotate(api_key, request.image.payload()).await {
            Ok(keywords) => keywords,
            Err(e) => {
                log::warn!("Vision API失敗: {}", e);
                Vec::new()
            }
        }
    }
}
