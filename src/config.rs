use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult};

const OPENAI_KEY_PLACEHOLDER: &str = "your_openai_api_key_here";
const PEXELS_KEY_PLACEHOLDER: &str = "your_pexels_api_key_here";

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// OpenAI API key, used for recommendations, curation and style generation
    #[serde(default)]
    pub openai_api_key: String,

    /// Pexels API key, used by the image collector
    #[serde(default)]
    pub pexels_api_key: String,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_openai_api_url")]
    pub openai_api_url: String,

    /// Multimodal chat model
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    /// Pexels API base URL
    #[serde(default = "default_pexels_api_url")]
    pub pexels_api_url: String,

    /// Root of the local image store; holds styles.json and one directory per style
    #[serde(default = "default_styles_dir")]
    pub styles_dir: PathBuf,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Timeout for image search and download requests
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Timeout for AI completion requests
    #[serde(default = "default_ai_timeout_secs")]
    pub ai_timeout_secs: u64,

    /// Extra attempts for transient network failures in the collector
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between styles during a full collection run, in milliseconds
    #[serde(default = "default_style_delay_ms")]
    pub style_delay_ms: u64,

    /// Target number of cached images per style
    #[serde(default = "default_images_per_style")]
    pub images_per_style: usize,

    /// Number of styles shown in one quiz
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Largest accepted room upload, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_openai_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_pexels_api_url() -> String {
    "https://api.pexels.com".to_string()
}

fn default_styles_dir() -> PathBuf {
    PathBuf::from("room_styles")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_http_timeout_secs() -> u64 {
    60
}

fn default_ai_timeout_secs() -> u64 {
    90
}

fn default_max_retries() -> u32 {
    3
}

fn default_style_delay_ms() -> u64 {
    1000
}

fn default_images_per_style() -> usize {
    70
}

fn default_sample_size() -> usize {
    5
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            pexels_api_key: String::new(),
            openai_api_url: default_openai_api_url(),
            openai_model: default_openai_model(),
            pexels_api_url: default_pexels_api_url(),
            styles_dir: default_styles_dir(),
            host: default_host(),
            port: default_port(),
            http_timeout_secs: default_http_timeout_secs(),
            ai_timeout_secs: default_ai_timeout_secs(),
            max_retries: default_max_retries(),
            style_delay_ms: default_style_delay_ms(),
            images_per_style: default_images_per_style(),
            sample_size: default_sample_size(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env`, if present),
    /// then validate it.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| AppError::Config(format!("Failed to load config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that both API keys are present and that the numeric settings are usable.
    ///
    /// Runs before any client is built, so a bad setup never reaches the network.
    pub fn validate(&self) -> AppResult<()> {
        if !key_is_set(&self.openai_api_key, OPENAI_KEY_PLACEHOLDER) {
            return Err(AppError::Config(
                "Missing or invalid OpenAI API key. Add OPENAI_API_KEY=<your key> to your \
                 environment or .env file (keys: https://platform.openai.com/api-keys)"
                    .to_string(),
            ));
        }
        if !key_is_set(&self.pexels_api_key, PEXELS_KEY_PLACEHOLDER) {
            return Err(AppError::Config(
                "Missing or invalid Pexels API key. Add PEXELS_API_KEY=<your key> to your \
                 environment or .env file (free keys: https://www.pexels.com/api/)"
                    .to_string(),
            ));
        }
        if self.sample_size == 0 {
            return Err(AppError::Config("SAMPLE_SIZE must be at least 1".to_string()));
        }
        if self.images_per_style == 0 {
            return Err(AppError::Config(
                "IMAGES_PER_STYLE must be at least 1".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(AppError::Config(
                "MAX_UPLOAD_BYTES must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Location of the style catalog file
    pub fn catalog_path(&self) -> PathBuf {
        self.styles_dir.join("styles.json")
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }

    pub fn style_delay(&self) -> Duration {
        Duration::from_millis(self.style_delay_ms)
    }
}

fn key_is_set(value: &str, placeholder: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != placeholder
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            openai_api_key: "sk-test".to_string(),
            pexels_api_key: "px-test".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_openai_key() {
        let config = Config {
            openai_api_key: String::new(),
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_placeholder_pexels_key() {
        let config = Config {
            pexels_api_key: PEXELS_KEY_PLACEHOLDER.to_string(),
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("PEXELS_API_KEY"));
    }

    #[test]
    fn test_zero_sample_size() {
        let config = Config {
            sample_size: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.catalog_path(), PathBuf::from("room_styles/styles.json"));
        assert_eq!(config.openai_model, "gpt-4o");
        assert_eq!(config.sample_size, 5);
        assert_eq!(config.http_timeout(), Duration::from_secs(60));
        assert_eq!(config.style_delay(), Duration::from_secs(1));
    }
}
