use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ParleyError, Result};

/// Model used when neither the request nor the configuration names one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Top-level configuration for the Parley server.
///
/// Loaded from `~/.parley/config.toml` by default. Each section corresponds
/// to one subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl ParleyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ParleyConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ParleyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply overrides from the process environment.
    ///
    /// Recognises `GEMINI_API_KEY`, `GEMINI_MODEL_NAME` and `PARLEY_PORT`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key.trim().to_string());
            }
        }
        if let Some(raw) = lookup("GEMINI_MODEL_NAME") {
            if let Some(model) = normalize_model_name(&raw) {
                self.llm.default_model = model;
            }
        }
        if let Some(port) = lookup("PARLEY_PORT").and_then(|p| p.parse::<u16>().ok()) {
            self.general.port = port;
        }
    }

    /// The configured default model, falling back to [`DEFAULT_MODEL`].
    pub fn default_model(&self) -> String {
        normalize_model_name(&self.llm.default_model).unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }
}

/// Strip a trailing `# comment` and surrounding whitespace from a model name.
///
/// Returns `None` when nothing is left.
pub fn normalize_model_name(raw: &str) -> Option<String> {
    let name = raw.split('#').next().unwrap_or_default().trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// General server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database and the generated API token.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Interface to bind the HTTP server to.
    pub host: String,
    /// HTTP server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.parley/data".to_string(),
            log_level: "info".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3040,
        }
    }
}

/// Upstream language-model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider API key. Usually supplied through `GEMINI_API_KEY`.
    pub api_key: Option<String>,
    /// Base URL of the `models/{model}:generateContent` endpoint family.
    pub base_url: String,
    /// Model used when a conversation does not name one.
    pub default_model: String,
    /// Known-good models tried after the requested and default models.
    pub fallback_models: Vec<String>,
    /// Attempts per candidate model.
    pub max_attempts: u32,
    /// Linear backoff unit between attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Per-request transport timeout, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            fallback_models: vec![
                "gemini-2.5-flash".to_string(),
                "gemini-2.0-flash".to_string(),
                "gemini-1.5-flash".to_string(),
                "gemini-1.5-pro".to_string(),
            ],
            max_attempts: 3,
            retry_delay_ms: 300,
            request_timeout_secs: 60,
        }
    }
}

/// Web search and news feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Instant-answer endpoint for web search.
    pub web_search_url: String,
    /// RSS search endpoint for news.
    pub news_url: String,
    /// Results injected into an augmented prompt.
    pub prompt_result_limit: usize,
    /// Headlines fetched for a news query.
    pub news_limit: usize,
    /// Per-request transport timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            web_search_url: "https://api.duckduckgo.com/".to_string(),
            news_url: "https://news.google.com/rss/search".to_string(),
            prompt_result_limit: 4,
            news_limit: 6,
            timeout_secs: 10,
        }
    }
}

/// Persistence and file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file name inside the data directory.
    pub database_file: String,
    /// Directory that attachment URLs are resolved against.
    pub public_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: "parley.db".to_string(),
            public_dir: "public".to_string(),
        }
    }
}

/// Static bearer-token table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub users: Vec<ApiUser>,
}

/// One bearer token and the identity it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUser {
    pub token: String,
    pub id: String,
    pub name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ParleyConfig::default();
        assert_eq!(config.general.data_dir, "~/.parley/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.port, 3040);
        assert_eq!(config.llm.default_model, "gemini-2.5-flash");
        assert_eq!(config.llm.max_attempts, 3);
        assert_eq!(config.llm.retry_delay_ms, 300);
        assert_eq!(config.llm.fallback_models.len(), 4);
        assert_eq!(config.search.prompt_result_limit, 4);
        assert_eq!(config.search.news_limit, 6);
        assert_eq!(config.storage.public_dir, "public");
        assert!(config.auth.users.is_empty());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/custom/data"
log_level = "debug"
port = 8080

[llm]
default_model = "gemini-2.5-pro"
max_attempts = 2

[[auth.users]]
token = "secret"
id = "u1"
name = "Asha"
email = "asha@example.com"
"#;
        let file = create_temp_config(content);
        let config = ParleyConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/custom/data");
        assert_eq!(config.general.port, 8080);
        assert_eq!(config.llm.default_model, "gemini-2.5-pro");
        assert_eq!(config.llm.max_attempts, 2);
        // Unset fields in a present section keep their defaults
        assert_eq!(config.llm.retry_delay_ms, 300);
        assert_eq!(config.auth.users.len(), 1);
        assert_eq!(config.auth.users[0].id, "u1");
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = ParleyConfig::load(file.path()).unwrap();
        assert_eq!(config.general.host, "127.0.0.1");
        assert_eq!(config.search.web_search_url, "https://api.duckduckgo.com/");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(ParleyConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ParleyConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.parley/data");
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = ParleyConfig::default();
        config.llm.default_model = "gemini-1.5-pro".to_string();
        config.save(&path).unwrap();

        let reloaded = ParleyConfig::load(&path).unwrap();
        assert_eq!(reloaded.llm.default_model, "gemini-1.5-pro");
        assert_eq!(reloaded.general.port, config.general.port);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("GEMINI_API_KEY", " key-123 "),
            ("GEMINI_MODEL_NAME", "gemini-2.0-flash # cheaper"),
            ("PARLEY_PORT", "9000"),
        ]);
        let mut config = ParleyConfig::default();
        config.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key.as_deref(), Some("key-123"));
        assert_eq!(config.llm.default_model, "gemini-2.0-flash");
        assert_eq!(config.general.port, 9000);
    }

    #[test]
    fn test_env_override_ignores_blank_model_and_bad_port() {
        let mut config = ParleyConfig::default();
        config.apply_overrides_from(|k| match k {
            "GEMINI_MODEL_NAME" => Some("  # only a comment".to_string()),
            "PARLEY_PORT" => Some("not-a-port".to_string()),
            _ => None,
        });
        assert_eq!(config.llm.default_model, DEFAULT_MODEL);
        assert_eq!(config.general.port, 3040);
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_normalize_model_name() {
        assert_eq!(
            normalize_model_name("gemini-2.5-pro"),
            Some("gemini-2.5-pro".to_string())
        );
        assert_eq!(
            normalize_model_name("  gemini-2.5-pro#fast "),
            Some("gemini-2.5-pro".to_string())
        );
        assert_eq!(normalize_model_name("   "), None);
    }

    #[test]
    fn test_default_model_falls_back_when_blank() {
        let mut config = ParleyConfig::default();
        config.llm.default_model = " ".to_string();
        assert_eq!(config.default_model(), DEFAULT_MODEL);
    }
}
