//! Configuration loading and management for adcopy.
//!
//! Loads settings from `adcopy.toml` with environment variable overrides for
//! endpoints and credentials. Every section has defaults, so the service can run
//! from the environment alone.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_FILE: &str = "adcopy.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
}

/// Cache file location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: PathBuf,
}

/// Page fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// User-Agent sent with plain HTTP fetches
    pub user_agent: String,
    pub timeout_secs: u64,
    /// WebDriver endpoint used by the headless-browser strategy
    pub webdriver_url: Option<String>,
    /// Retry blocked fetches through the browser
    pub browser_fallback: bool,
}

/// Remote completion service and its sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub api_version: String,
    /// Deployment (engine) name on the completion service
    pub deployment: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Config {
    /// Load configuration from the default location and apply environment overrides.
    ///
    /// A missing config file is not an error; defaults are used instead.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_file() {
            Some(path) => Self::load_from(&path)?,
            None => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific path, without environment overrides
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Override settings from the environment. `lookup` is `std::env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("AZURE_OPENAI_ENDPOINT") {
            self.generation.endpoint = Some(endpoint);
        }
        if let Some(key) = lookup("AZURE_OPENAI_API_KEY") {
            self.generation.api_key = Some(key);
        }
        if let Some(version) = lookup("AZURE_OPENAI_API_VERSION") {
            self.generation.api_version = version;
        }
        if let Some(deployment) = lookup("AZURE_OPENAI_DEPLOYMENT") {
            self.generation.deployment = deployment;
        }
        if let Some(path) = lookup("ADCOPY_CACHE_PATH") {
            self.cache.path = PathBuf::from(path);
        }
        if let Some(url) = lookup("WEBDRIVER_URL") {
            self.fetch.webdriver_url = Some(url);
        }
    }

    /// Check everything the service needs before it accepts requests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let generation = &self.generation;

        if generation.endpoint.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Missing("generation.endpoint (AZURE_OPENAI_ENDPOINT)"));
        }
        if generation.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Missing("generation.api_key (AZURE_OPENAI_API_KEY)"));
        }
        if generation.deployment.is_empty() {
            return Err(ConfigError::Missing("generation.deployment"));
        }
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(invalid("generation.temperature", "must be within 0..=2"));
        }
        if !(0.0..=1.0).contains(&generation.top_p) {
            return Err(invalid("generation.top_p", "must be within 0..=1"));
        }
        if !(-2.0..=2.0).contains(&generation.frequency_penalty) {
            return Err(invalid("generation.frequency_penalty", "must be within -2..=2"));
        }
        if !(-2.0..=2.0).contains(&generation.presence_penalty) {
            return Err(invalid("generation.presence_penalty", "must be within -2..=2"));
        }
        if generation.max_tokens == 0 {
            return Err(invalid("generation.max_tokens", "must be greater than zero"));
        }

        self.validate_fetch()
    }

    /// Check only what scraping needs; the completion service is not consulted.
    pub fn validate_fetch(&self) -> Result<(), ConfigError> {
        if self.fetch.browser_fallback && self.fetch.webdriver_url.is_none() {
            return Err(invalid(
                "fetch.browser_fallback",
                "requires fetch.webdriver_url (WEBDRIVER_URL)",
            ));
        }

        Ok(())
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        // Check current directory first
        let local_config = PathBuf::from(CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        // Check home directory
        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config").join("adcopy").join(CONFIG_FILE);
            if home_config.exists() {
                return Some(home_config);
            }
        }

        None
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cached_data.json"),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) ",
                "Chrome/124.0 Safari/537.36"
            )
            .to_string(),
            timeout_secs: 30,
            webdriver_url: None,
            browser_fallback: false,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            api_version: "2023-09-15-preview".to_string(),
            deployment: "anycopychatgpt35".to_string(),
            temperature: 0.7,
            max_tokens: 1500,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com"),
            ("AZURE_OPENAI_API_KEY", "secret"),
        ]));
        config
    }

    #[test]
    fn defaults_match_legacy_deployment() {
        let config = Config::default();
        assert_eq!(config.cache.path, PathBuf::from("cached_data.json"));
        assert_eq!(config.generation.deployment, "anycopychatgpt35");
        assert_eq!(config.generation.api_version, "2023-09-15-preview");
        assert_eq!(config.generation.max_tokens, 1500);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [cache]
            path = "/var/lib/adcopy/cache.json"

            [generation]
            temperature = 0.9
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.path, PathBuf::from("/var/lib/adcopy/cache.json"));
        assert_eq!(config.generation.temperature, 0.9);
        assert_eq!(config.generation.top_p, 1.0);
        assert_eq!(config.fetch.timeout_secs, 30);
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[server]\naddr = \"0.0.0.0:9000\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server.addr.port(), 9000);
    }

    #[test]
    fn load_from_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[server\naddr = ").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("AZURE_OPENAI_API_VERSION", "2024-02-01"),
            ("AZURE_OPENAI_DEPLOYMENT", "copy-model"),
            ("ADCOPY_CACHE_PATH", "/tmp/cache.json"),
            ("WEBDRIVER_URL", "http://localhost:4444"),
        ]));

        assert_eq!(config.generation.api_version, "2024-02-01");
        assert_eq!(config.generation.deployment, "copy-model");
        assert_eq!(config.cache.path, PathBuf::from("/tmp/cache.json"));
        assert_eq!(
            config.fetch.webdriver_url.as_deref(),
            Some("http://localhost:4444")
        );
    }

    #[test]
    fn validate_requires_endpoint_and_key() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));

        let mut config = Config::default();
        config.apply_env(env(&[("AZURE_OPENAI_ENDPOINT", "https://example")]));
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));

        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_sampling() {
        let mut config = valid_config();
        config.generation.temperature = 3.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "generation.temperature", .. })
        ));

        let mut config = valid_config();
        config.generation.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_webdriver_for_fallback() {
        let mut config = valid_config();
        config.fetch.browser_fallback = true;
        assert!(config.validate().is_err());

        config.fetch.webdriver_url = Some("http://localhost:4444".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_fetch_ignores_missing_credentials() {
        let mut config = Config::default();
        assert!(config.validate().is_err());
        assert!(config.validate_fetch().is_ok());

        config.fetch.browser_fallback = true;
        assert!(matches!(
            config.validate_fetch(),
            Err(ConfigError::Invalid { field: "fetch.browser_fallback", .. })
        ));
    }
}
