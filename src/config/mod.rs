use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::output::OutputFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Output settings
    pub output: OutputConfig,

    /// Extraction settings
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Base directory transcripts are written under
    pub base_dir: PathBuf,

    /// Default artifact format
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Preferred caption language
    pub language: String,

    /// Seconds between successful fetches
    pub rate_limit_seconds: u64,

    /// Attempts per video for recoverable failures
    pub max_fetch_attempts: u32,

    /// Skip videos already extracted in a prior run
    pub skip_existing: bool,

    /// Allow falling back to a certificate-bypassing client on SSL errors
    pub ssl_bypass: bool,

    /// YouTube Data API v3 key; falls back to the YOUTUBE_API_KEY env var
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// State directory for resumable jobs (defaults next to the output)
    pub state_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: OutputConfig {
                base_dir: PathBuf::from("transcripts"),
                format: OutputFormat::Markdown,
            },
            extraction: ExtractionConfig {
                language: "en".to_string(),
                rate_limit_seconds: 3,
                max_fetch_attempts: 3,
                skip_existing: true,
                ssl_bypass: true,
                api_key: None,
                state_dir: None,
            },
        }
    }
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

        Ok(config_dir.join("tubescribe").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.extraction.language.is_empty() {
            anyhow::bail!("Caption language must not be empty");
        }

        if self.extraction.max_fetch_attempts == 0 {
            anyhow::bail!("max_fetch_attempts must be at least 1");
        }

        Ok(())
    }

    /// Delay between successful fetches
    pub fn rate_limit(&self) -> Duration {
        Duration::from_secs(self.extraction.rate_limit_seconds)
    }

    /// Job-state directory, next to the output tree unless overridden
    pub fn state_dir(&self) -> PathBuf {
        self.extraction
            .state_dir
            .clone()
            .unwrap_or_else(|| self.output.base_dir.join(".state"))
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Output Dir: {}", self.output.base_dir.display());
        println!("  Format: {}", self.output.format);
        println!("  Language: {}", self.extraction.language);
        println!("  Rate Limit: {}s", self.extraction.rate_limit_seconds);
        println!("  Max Fetch Attempts: {}", self.extraction.max_fetch_attempts);
        println!("  Skip Existing: {}", self.extraction.skip_existing);
        println!("  SSL Bypass: {}", self.extraction.ssl_bypass);
        println!(
            "  API Key: {}",
            if self.extraction.api_key.is_some() {
                "configured"
            } else {
                "not set"
            }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.extraction.language, "en");
        assert_eq!(parsed.output.format, OutputFormat::Markdown);
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let mut config = Config::default();
        config.extraction.max_fetch_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_state_dir_defaults_under_output() {
        let config = Config::default();
        assert_eq!(config.state_dir(), PathBuf::from("transcripts/.state"));
    }
}
