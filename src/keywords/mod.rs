//! キーワード取得モジュール
//!
//! 各キーワードソースは同じ `KeywordSource` を実装し、失敗を外に出さない
//! （失敗はログに残して空リストにする）。`KeywordAggregator` が
//! メタデータ → Vision（キーがある場合）→ 推論サービス の順に実行し、
//! 出現順を保って重複を除き、最大15件にまとめる。

pub mod forwarder;
pub mod heuristic;
pub mod inference;
pub mod metadata;
pub mod vision;

pub use forwarder::{DirectForwarder, ForwardError, ForwardResponse, Forwarder, ProxyForwarder};
pub use heuristic::HeuristicSource;
pub use inference::InferenceSource;
pub use metadata::MetadataSource;
pub use vision::VisionSource;

use crate::config::{Config, InferenceMode};
use crate::error::Result;
use async_trait::async_trait;
use clap::ValueEnum;
use phototag_common::{merge_keywords, EncodedImage};
use std::time::Duration;

/// 集約後のキーワード上限
pub const MAX_KEYWORDS: usize = 15;

/// 1枚分のキーワード取得リクエスト
pub struct KeywordRequest<'a> {
    /// 元ファイルのバイト列（EXIF用）
    pub file_bytes: &'a [u8],
    /// 正規化済み画像
    pub image: &'a EncodedImage,
    pub vision_api_key: Option<&'a str>,
}

#[async_trait]
pub trait KeywordSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// 失敗時は空リストを返す
    async fn keywords(&self, request: &KeywordRequest<'_>) -> Vec<String>;
}

#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    pub use_metadata: bool,
    pub use_vision: bool,
    pub use_inference: bool,
    pub vision_api_key: Option<String>,
}

impl AggregateOptions {
    /// Visionを使うか（有効かつキーがある場合のみ）
    fn vision_enabled(&self) -> bool {
        self.use_vision && self.vision_api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// キーワードの取得元
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceMode {
    /// EXIFのみ
    Exif,
    /// Vision APIのみ
    Vision,
    /// 推論サービスのみ
    Inference,
    /// すべて（Visionのキーがあれば推論サービスは使わない）
    Combined,
}

impl SourceMode {
    pub fn options(self, vision_api_key: Option<String>) -> AggregateOptions {
        let (use_metadata, use_vision, use_inference) = match self {
            SourceMode::Exif => (true, false, false),
            SourceMode::Vision => (false, true, false),
            SourceMode::Inference => (false, false, true),
            SourceMode::Combined => (true, true, true),
        };
        AggregateOptions {
            use_metadata,
            use_vision,
            use_inference,
            vision_api_key,
        }
    }
}

pub struct KeywordAggregator {
    metadata: Box<dyn KeywordSource>,
    vision: Box<dyn KeywordSource>,
    inference: Box<dyn KeywordSource>,
}

impl KeywordAggregator {
    pub fn new(
        metadata: Box<dyn KeywordSource>,
        vision: Box<dyn KeywordSource>,
        inference: Box<dyn KeywordSource>,
    ) -> Self {
        Self {
            metadata,
            vision,
            inference,
        }
    }

    /// 設定から本番用のソースを組み立てる
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        let (forwarder, restricted_origin): (Box<dyn Forwarder>, bool) = match config.inference_mode {
            InferenceMode::Proxy => (
                Box::new(ProxyForwarder::new(client.clone(), config.get_proxy_url())),
                config.is_restricted_origin(),
            ),
            InferenceMode::Direct => (
                Box::new(DirectForwarder::new(client.clone(), config.get_hf_token())),
                false,
            ),
        };

        let inference = InferenceSource::new(forwarder, config.models.clone(), HeuristicSource)
            .with_warmup_backoff(Duration::from_secs(config.warmup_backoff_secs))
            .with_restricted_origin(restricted_origin);

        Ok(Self::new(
            Box::new(MetadataSource),
            Box::new(VisionSource::new(client)),
            Box::new(inference),
        ))
    }

    /// 有効なソースを順に実行してキーワードをまとめる
    pub async fn aggregate(&self, file_bytes: &[u8], image: &EncodedImage, options: &AggregateOptions) -> Vec<String> {
        let request = KeywordRequest {
            file_bytes,
            image,
            vision_api_key: options.vision_api_key.as_deref(),
        };

        let mut collected: Vec<Vec<String>> = Vec::new();

        if options.use_metadata {
            collected.push(self.run(self.metadata.as_ref(), &request).await);
        }

        let vision_enabled = options.vision_enabled();
        if vision_enabled {
            collected.push(self.run(self.vision.as_ref(), &request).await);
        }

        // Visionが使えるときは推論サービスを使わない
        if options.use_inference && !vision_enabled {
            collected.push(self.run(self.inference.as_ref(), &request).await);
        }

        let keywords = merge_keywords(collected, MAX_KEYWORDS);
        log::debug!("集約キーワード: {:?}", keywords);
        keywords
    }

    async fn run(&self, source: &dyn KeywordSource, request: &KeywordRequest<'_>) -> Vec<String> {
        let keywords = source.keywords(request).await;
        log::debug!("{}: {:?}", source.name(), keywords);
        keywords
    }
}
