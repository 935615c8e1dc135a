use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;
use crate::experiments::ExperimentDecision;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub chat: ChatConfig,
    pub experiments: ExperimentsConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ChatConfig {
    pub base_url: String,
    pub summary_path: String,
    pub history_path: String,
    pub v2_endpoint: bool,
    pub request_timeout_secs: Option<u64>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:18000/api/learning_assistant/v1/course_id".to_string(),
            summary_path: "chat-summary".to_string(),
            history_path: "history".to_string(),
            v2_endpoint: false,
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ExperimentsConfig {
    pub sdk_key: Option<String>,
    pub decisions: BTreeMap<String, ExperimentDecision>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Reads the file when it exists; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("CHAT_RESPONSE_URL").filter(|v| !v.trim().is_empty()) {
            self.chat.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup("FEATURE_ENABLE_CHAT_V2_ENDPOINT") {
            self.chat.v2_endpoint = parse_bool("FEATURE_ENABLE_CHAT_V2_ENDPOINT", &raw)?;
        }
        if let Some(key) = lookup("OPTIMIZELY_FULL_STACK_SDK_KEY") {
            let key = key.trim().to_string();
            self.experiments.sdk_key = if key.is_empty() { None } else { Some(key) };
        }
        if let Some(raw) = lookup("ENABLE_XPERT_AUDIT") {
            self.audit.enabled = parse_bool("ENABLE_XPERT_AUDIT", &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.chat.base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "chat.base_url".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "chat.base_url".to_string(),
                message: format!("'{base}' is not an http(s) URL"),
            });
        }
        for (key, value) in [
            ("chat.summary_path", &self.chat.summary_path),
            ("chat.history_path", &self.chat.history_path),
        ] {
            if value.trim_matches('/').is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.chat.summary_path, "chat-summary");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn sections_parse_with_partial_fields() {
        let config = Config::from_toml_str(
            r#"
            [chat]
            base_url = "https://courses.example/api/learning_assistant/v1/course_id"
            summary_path = "summary"
            v2_endpoint = true

            [experiments]
            sdk_key = "sdk-123"

            [experiments.decisions._cosmo__xpert_gpt_4_0_prompt]
            enabled = true
            variation_key = "updated_prompt"

            [audit]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.chat.summary_path, "summary");
        assert_eq!(config.chat.history_path, "history");
        assert!(config.chat.v2_endpoint);
        assert_eq!(config.experiments.sdk_key.as_deref(), Some("sdk-123"));
        assert_eq!(
            config.experiments.decisions["_cosmo__xpert_gpt_4_0_prompt"],
            ExperimentDecision::enabled("updated_prompt")
        );
        assert!(config.audit.enabled);
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CHAT_RESPONSE_URL", "https://lms.example/chat"),
            ("FEATURE_ENABLE_CHAT_V2_ENDPOINT", "true"),
            ("OPTIMIZELY_FULL_STACK_SDK_KEY", "  "),
            ("ENABLE_XPERT_AUDIT", "1"),
        ]);
        let mut config = Config::default();
        config.experiments.sdk_key = Some("from-file".to_string());

        config
            .apply_env_overrides(|key| env.get(key).map(|value| value.to_string()))
            .unwrap();

        assert_eq!(config.chat.base_url, "https://lms.example/chat");
        assert!(config.chat.v2_endpoint);
        assert_eq!(config.experiments.sdk_key, None);
        assert!(config.audit.enabled);
    }

    #[test]
    fn bad_boolean_is_rejected_with_its_key() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(|key| (key == "ENABLE_XPERT_AUDIT").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("ENABLE_XPERT_AUDIT"));
    }

    #[test]
    fn load_reads_file_and_tolerates_missing_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent.toml");
        assert_eq!(Config::load(&missing).unwrap(), Config::default());

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[chat]\nhistory_path = \"messages\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.chat.history_path, "messages");

        std::fs::write(&path, "[chat\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn validate_rejects_non_http_base() {
        let mut config = Config::default();
        config.chat.base_url = "ftp://example".to_string();
        assert!(config.validate().is_err());
    }
}
