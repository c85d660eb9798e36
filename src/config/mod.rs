use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::providers::ProviderKind;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// API credentials
    pub api: ApiConfig,

    /// Application settings
    pub app: AppConfig,

    /// Persisted transcript-provider usage counters
    pub usage: UsageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    /// YouTube Data API key
    pub youtube_api_key: String,

    /// Key for the synchronous transcript provider
    pub direct_api_key: String,

    /// Key for the submit-then-poll transcript provider
    pub polling_api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default transcript provider
    pub default_provider: ProviderKind,

    /// Default channel-discovery limit (1-50)
    pub default_limit: usize,

    /// Delay before each transcript fetch, to stay under provider rate limits
    pub item_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: ProviderKind::default(),
            default_limit: 10,
            item_delay_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UsageConfig {
    /// Fetches counted against the synchronous provider
    pub direct: u32,

    /// Fetches counted against the polling provider
    pub polling: u32,
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("viralscope").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.app.default_limit == 0 || self.app.default_limit > 50 {
            anyhow::bail!("default_limit must be between 1 and 50");
        }
        Ok(())
    }

    /// The credential for a transcript provider, if one is configured
    pub fn provider_key(&self, kind: ProviderKind) -> Option<String> {
        let key = match kind {
            ProviderKind::Direct => &self.api.direct_api_key,
            ProviderKind::Polling => &self.api.polling_api_key,
        };
        (!key.trim().is_empty()).then(|| key.trim().to_string())
    }

    /// The YouTube Data API credential, if configured
    pub fn youtube_key(&self) -> Option<String> {
        let key = self.api.youtube_api_key.trim();
        (!key.is_empty()).then(|| key.to_string())
    }

    /// Display current configuration (credentials masked)
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  YouTube API key: {}", mask(&self.api.youtube_api_key));
        println!("  Direct provider key: {}", mask(&self.api.direct_api_key));
        println!("  Polling provider key: {}", mask(&self.api.polling_api_key));
        println!("  Default provider: {}", self.app.default_provider);
        println!("  Default limit: {}", self.app.default_limit);
        println!("  Item delay: {}ms", self.app.item_delay_ms);
        println!(
            "  Usage: direct {}/{}, polling {}/{}",
            self.usage.direct,
            ProviderKind::Direct.ceiling(),
            self.usage.polling,
            ProviderKind::Polling.ceiling()
        );
    }

    /// Where to edit credentials by hand
    pub fn describe_path() -> Result<PathBuf> {
        Self::config_path()
    }
}

fn mask(key: &str) -> String {
    let key = key.trim();
    if key.is_empty() {
        "(not set)".to_string()
    } else if key.len() <= 8 {
        "****".to_string()
    } else {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    }
}
