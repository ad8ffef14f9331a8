use crate::error::{PhotoTagError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 推論サービスの呼び出し方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMode {
    /// プロキシ経由（トークンはプロキシ側が保持）
    #[default]
    Proxy,
    /// 推論サービスへ直接
    Direct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vision_api_key: Option<String>,
    pub hf_token: Option<String>,
    pub proxy_url: String,
    pub inference_mode: InferenceMode,
    pub models: Vec<String>,
    pub storage_dir: Option<PathBuf>,
    pub storage_quota_bytes: u64,
    pub warmup_backoff_secs: u64,
    pub timeout_seconds: u64,
    pub bind: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default_config())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| PhotoTagError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("phototag").join("config.json"))
    }

    fn default_config() -> Self {
        Self {
            vision_api_key: None,
            hf_token: None,
            proxy_url: "http://127.0.0.1:8787/api/huggingface".into(),
            inference_mode: InferenceMode::Proxy,
            models: vec![
                "google/vit-base-patch16-224".into(),
                "microsoft/resnet-50".into(),
                "facebook/deit-base-distilled-patch16-224".into(),
                "microsoft/beit-base-patch16-224".into(),
            ],
            storage_dir: None,
            storage_quota_bytes: 5 * 1024 * 1024,
            warmup_backoff_secs: 5,
            timeout_seconds: 60,
            bind: "127.0.0.1:8787".into(),
        }
    }

    /// 写真データの保存先（未設定ならOSのデータディレクトリ）
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.storage_dir {
            return Ok(dir.clone());
        }
        let data = dirs::data_dir()
            .ok_or_else(|| PhotoTagError::Config("データディレクトリが見つかりません".into()))?;
        Ok(data.join("phototag"))
    }

    pub fn get_vision_api_key(&self) -> Option<String> {
        // 環境変数を優先
        non_empty_env("GOOGLE_VISION_API_KEY").or_else(|| self.vision_api_key.clone())
    }

    pub fn get_hf_token(&self) -> Option<String> {
        non_empty_env("HF_TOKEN").or_else(|| self.hf_token.clone())
    }

    pub fn get_proxy_url(&self) -> String {
        non_empty_env("PHOTOTAG_PROXY_URL").unwrap_or_else(|| self.proxy_url.clone())
    }

    /// プロキシURLがローカル（file: またはループバック）かどうか
    pub fn is_restricted_origin(&self) -> bool {
        is_restricted_url(&self.get_proxy_url())
    }

    pub fn set_vision_api_key(&mut self, key: String) -> Result<()> {
        self.vision_api_key = Some(key);
        self.save()
    }

    pub fn set_hf_token(&mut self, token: String) -> Result<()> {
        self.hf_token = Some(token);
        self.save()
    }

    pub fn set_proxy_url(&mut self, url: String) -> Result<()> {
        self.proxy_url = url;
        self.save()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn is_restricted_url(url: &str) -> bool {
    if url.starts_with("file:") {
        return true;
    }
    let host = url
        .split("://")
        .nth(1)
        .unwrap_or(url)
        .split(['/', ':'])
        .next()
        .unwrap_or_default();
    host == "localhost" || host.ends_with(".localhost") || host == "127.0.0.1"
}
