//! 画像分類サービスによるキーワード取得
//!
//! モデル一覧を順に試し、最初に分類結果を返したモデルのラベルを使う。
//!
//! - 503（モデル準備中）: 一定時間待って次のモデルへ
//! - 404 / 401 / その他の失敗: 次のモデルへ
//! - 遮断エラーかつ制限付きオリジン: ループを打ち切る
//!
//! どのモデルも使えなかった場合はピクセル統計による推定に切り替える。

use super::forwarder::Forwarder;
use super::{HeuristicSource, KeywordRequest, KeywordSource};
use async_trait::async_trait;
use phototag_common::{label_keywords, ClassificationPayload};
use std::time::Duration;

const DEFAULT_WARMUP_BACKOFF: Duration = Duration::from_secs(5);

pub struct InferenceSource {
    forwarder: Box<dyn Forwarder>,
    models: Vec<String>,
    warmup_backoff: Duration,
    restricted_origin: bool,
    fallback: HeuristicSource,
}

impl InferenceSource {
    pub fn new(forwarder: Box<dyn Forwarder>, models: Vec<String>, fallback: HeuristicSource) -> Self {
        Self {
            forwarder,
            models,
            warmup_backoff: DEFAULT_WARMUP_BACKOFF,
            restricted_origin: false,
            fallback,
        }
    }

    pub fn with_warmup_backoff(mut self, backoff: Duration) -> Self {
        self.warmup_backoff = backoff;
        self
    }

    /// 転送先がローカル（file: やループバック）の場合に true
    pub fn with_restricted_origin(mut self, restricted: bool) -> Self {
        self.restricted_origin = restricted;
        self
    }

    /// モデルを順に試す。どれも使えなければ None
    async fn classify(&self, image_base64: &str) -> Option<Vec<String>> {
        for model in &self.models {
            log::debug!("モデル試行: {}", model);

            let response = match self.forwarder.classify(model, image_base64).await {
                Ok(response) => response,
                Err(e) if e.is_cross_origin_block() && self.restricted_origin => {
                    log::warn!("推論サービスへの接続が遮断されました（{}）。以降のモデルを中止", e);
                    break;
                }
                Err(e) => {
                    log::warn!("モデル {} で転送エラー: {}", model, e);
                    continue;
                }
            };

            if !response.is_success() {
                match response.status {
                    503 => {
                        log::info!("モデル {} は準備中。{:?}待って次へ", model, self.warmup_backoff);
                        tokio::time::sleep(self.warmup_backoff).await;
                    }
                    404 => log::info!("モデル {} が見つかりません", model),
                    401 => log::info!("モデル {} は認証が必要です", model),
                    status => log::warn!("モデル {} エラー (status {}): {}", model, status, response.body),
                }
                continue;
            }

            let labels = ClassificationPayload::parse(&response.body)
                .map(ClassificationPayload::into_labels)
                .unwrap_or_default();
            if labels.is_empty() {
                log::warn!("モデル {} の応答にラベルがありません", model);
                continue;
            }

            return Some(label_keywords(&labels));
        }
        None
    }
}

#[async_trait]
impl KeywordSource for InferenceSource {
    fn name(&self) -> &'static str {
        "inference"
    }

    async fn keywords(&self, request: &KeywordRequest<'_>) -> Vec<String> {
        match self.classify(request.image.payload()).await {
            Some(keywords) => keywords,
            None => {
                log::info!("分類サービスが使えないため画像解析で代替します");
                self.fallback.keywords(request).await
            }
        }
    }
}
