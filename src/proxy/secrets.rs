use std::collections::HashMap;

/// 推論サービスのトークン名
pub const HF_TOKEN: &str = "HF_TOKEN";
/// Vision APIキー名
pub const GOOGLE_VISION_API_KEY: &str = "GOOGLE_VISION_API_KEY";

/// 秘密情報の取得元（リクエストごとに読む）
pub trait SecretSource: Send + Sync {
    /// 未設定・空文字は None
    fn get(&self, name: &str) -> Option<String>;
}

/// 環境変数から読む。未設定なら設定ファイル由来の値を使う
#[derive(Debug, Default)]
pub struct EnvSecrets {
    fallback: HashMap<String, String>,
}

impl EnvSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(mut self, name: &str, value: Option<String>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.fallback.insert(name.to_string(), value);
        }
        self
    }
}

impl SecretSource for EnvSecrets {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.fallback.get(name).cloned())
    }
}

/// 固定値（テスト用）
#[derive(Debug, Default, Clone)]
pub struct StaticSecrets(HashMap<String, String>);

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.0.insert(name.to_string(), value.to_string());
        self
    }
}

impl SecretSource for StaticSecrets {
    fn get(&self, name: &str) -> Option<String> {
        self.0.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_secrets_treat_empty_as_missing() {
        let secrets = StaticSecrets::new().with(HF_TOKEN, "hf_x").with(GOOGLE_VISION_API_KEY, "");
        assert_eq!(secrets.get(HF_TOKEN).as_deref(), Some("hf_x"));
        assert!(secrets.get(GOOGLE_VISION_API_KEY).is_none());
        assert!(secrets.get("OTHER").is_none());
    }

    #[test]
    fn test_env_secrets_fallback() {
        let name = "PHOTOTAG_TEST_SECRET_UNSET";
        let secrets = EnvSecrets::new().with_fallback(name, Some("from-file".into()));
        assert_eq!(secrets.get(name).as_deref(), Some("from-file"));
        assert!(EnvSecrets::new().with_fallback(name, Some(String::new())).get(name).is_none());
    }
}
