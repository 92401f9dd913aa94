use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::ai_provider::ProviderOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: ProviderConfig,
    #[serde(default)]
    pub defaults: DefaultConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub openai: Option<ProviderSettings>,
    pub claude: Option<ProviderSettings>,
    pub anthropic: Option<ProviderSettings>,
    pub openrouter: Option<ProviderSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub model: Option<String>,
    pub timeout: Option<u64>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultConfig {
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
}

fn provider_defaults(model: &str) -> ProviderSettings {
    ProviderSettings {
        model: Some(model.to_string()),
        timeout: Some(120),
        max_tokens: Some(2000),
        temperature: None,
        api_key: None,
        base_url: None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: ProviderConfig {
                openai: Some(provider_defaults("gpt-4")),
                claude: Some(provider_defaults("claude-3-5-haiku-latest")),
                anthropic: None,
                openrouter: Some(provider_defaults("openai/gpt-4o-mini")),
            },
            defaults: DefaultConfig {
                provider: Some("openai".to_string()),
            },
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load from the first config file found, merged with defaults.
    ///
    /// A missing file yields the defaults. An unparseable file is logged and
    /// ignored so a typo never blocks an analysis run.
    pub fn load() -> Result<Self> {
        if let Some(config_path) = Self::get_config_path() {
            match Self::load_from_path(&config_path) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Ignoring config file {}: {:#}", config_path.display(), e),
            }
        }
        Ok(Config::default())
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.merge_with_defaults(&Config::default());
        Ok(config)
    }

    fn get_config_path() -> Option<PathBuf> {
        if let Ok(path) = env::var("CLUSTERLENS_CONFIG") {
            return Some(PathBuf::from(path));
        }

        // Project-level config wins over the user-level one
        if let Ok(current_dir) = env::current_dir() {
            let project_config = current_dir.join(".clusterlens.toml");
            if project_config.exists() {
                return Some(project_config);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let user_config = home_dir.join(".config").join("clusterlens").join("config.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    fn merge_with_defaults(&mut self, defaults: &Config) {
        if self.providers.openai.is_none() {
            self.providers.openai = defaults.providers.openai.clone();
        }
        if self.providers.claude.is_none() {
            self.providers.claude = defaults.providers.claude.clone();
        }
        if self.providers.openrouter.is_none() {
            self.providers.openrouter = defaults.providers.openrouter.clone();
        }
        if self.defaults.provider.is_none() {
            self.defaults.provider = defaults.defaults.provider.clone();
        }
    }

    /// API key lookup: `<PROVIDER>_API_KEY` env var first, then the config file
    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        if let Ok(key) = env::var(format!("{}_API_KEY", provider.to_uppercase())) {
            if !key.is_empty() {
                return Some(key);
            }
        }

        self.get_provider_settings(provider)
            .and_then(|settings| settings.api_key.clone())
    }

    pub fn get_provider_settings(&self, provider: &str) -> Option<&ProviderSettings> {
        match provider.to_lowercase().as_str() {
            "openai" => self.providers.openai.as_ref(),
            "claude" | "anthropic" => self
                .providers
                .claude
                .as_ref()
                .or(self.providers.anthropic.as_ref()),
            "openrouter" => self.providers.openrouter.as_ref(),
            _ => None,
        }
    }

    pub fn provider_options(&self, provider: &str) -> ProviderOptions {
        self.get_provider_settings(provider)
            .map(ProviderOptions::from)
            .unwrap_or_default()
    }

    pub fn get_default_provider(&self) -> String {
        self.defaults.provider.as_deref().unwrap_or("openai").to_string()
    }

    pub fn get_database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(crate::db_path::get_database_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.get_default_provider(), "openai");
        assert_eq!(
            config.get_provider_settings("openai").unwrap().model.as_deref(),
            Some("gpt-4")
        );
        assert!(config.get_provider_settings("mistral").is_none());
    }

    #[test]
    fn test_partial_file_merges_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[defaults]
provider = "claude"

[providers.claude]
model = "claude-3-opus-20240229"
api_key = "from-file"
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.get_default_provider(), "claude");
        assert_eq!(
            config.get_provider_settings("anthropic").unwrap().model.as_deref(),
            Some("claude-3-opus-20240229")
        );
        assert!(config.providers.openai.is_some());
        assert!(config.providers.openrouter.is_some());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "providers = [").unwrap();

        assert!(Config::load_from_path(&path).is_err());
    }

    #[test]
    fn test_api_key_from_config_file() {
        let mut config = Config::default();
        if let Some(settings) = config.providers.openrouter.as_mut() {
            settings.api_key = Some("or-key".to_string());
        }

        // Only meaningful when the env var is not set in the test environment
        if env::var("OPENROUTER_API_KEY").is_err() {
            assert_eq!(config.get_api_key("openrouter").as_deref(), Some("or-key"));
        }
    }

    #[test]
    fn test_provider_options_from_settings() {
        let mut config = Config::default();
        if let Some(settings) = config.providers.openai.as_mut() {
            settings.timeout = Some(5);
            settings.temperature = Some(0.3);
        }

        let options = config.provider_options("openai");
        assert_eq!(options.timeout_secs, 5);
        assert_eq!(options.temperature, Some(0.3));
        assert_eq!(options.model.as_deref(), Some("gpt-4"));
    }

    #[test]
    fn test_serialized_config_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.storage.database_path = Some(dir.path().join("custom.db"));

        fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        let reloaded = Config::load_from_path(&path).unwrap();

        assert_eq!(reloaded.get_database_path(), dir.path().join("custom.db"));
    }
}
