use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RcaConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://log_history.db".to_string(),
            max_connections: 4,
        }
    }
}

/// Chat-completion backend settings.
///
/// The API key itself is never stored in the config file; `api_key_env` names
/// the environment variable that holds it.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    /// `azure` or `openai` (any OpenAI-compatible server, including local ones)
    pub provider: String,
    /// Resource base URL. For azure, falls back to `AZURE_ENDPOINT` when empty.
    pub endpoint: String,
    /// Deployment name (azure) or model name (openai)
    pub model: String,
    pub api_version: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "azure".to_string(),
            endpoint: String::new(),
            model: "gpt-4.1".to_string(),
            api_version: "2024-12-01-preview".to_string(),
            api_key_env: "API_KEY".to_string(),
            temperature: 0.0,
            timeout_seconds: 60,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl LlmConfig {
    /// Endpoint from config, or `AZURE_ENDPOINT` when the config leaves it blank.
    pub fn resolved_endpoint(&self) -> String {
        if !self.endpoint.trim().is_empty() {
            return self.endpoint.trim_end_matches('/').to_string();
        }
        std::env::var("AZURE_ENDPOINT")
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_default()
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// `none` or `mock`
    pub provider: String,
    pub max_references: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            provider: "none".to_string(),
            max_references: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

impl RcaConfig {
    /// Load `path` (optional) layered under `RCA__SECTION__KEY` environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("RCA").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests that read RCA__* variables must not overlap with ones that set them
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_missing_file_yields_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let config = RcaConfig::load("does-not-exist-rca.toml").unwrap();
        assert_eq!(config.database.url, "sqlite://log_history.db");
        assert_eq!(config.llm.model, "gpt-4.1");
        assert_eq!(config.llm.max_retries, 3);
        assert_eq!(config.history.default_limit, 10);
        assert_eq!(config.http.port, 8501);
        assert_eq!(config.enrichment.provider, "none");
    }

    #[test]
    fn test_partial_llm_section_keeps_other_defaults() {
        let config: RcaConfig = Config::builder()
            .add_source(config::File::from_str(
                "[llm]\nprovider = \"openai\"\nendpoint = \"http://localhost:11434/\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.resolved_endpoint(), "http://localhost:11434");
        assert_eq!(config.llm.timeout_seconds, 60);
        assert_eq!(config.llm.api_version, "2024-12-01-preview");
    }

    #[test]
    fn test_env_overrides_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let path = std::env::temp_dir().join(format!("rca-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[llm]\nmodel = \"from-file\"\nprovider = \"openai\"\n").unwrap();

        std::env::set_var("RCA__LLM__MODEL", "from-env");
        let loaded = RcaConfig::load(path.to_str().unwrap());
        std::env::remove_var("RCA__LLM__MODEL");
        std::fs::remove_file(&path).ok();

        let config = loaded.unwrap();
        assert_eq!(config.llm.model, "from-env");
        assert_eq!(config.llm.provider, "openai");
    }
}
