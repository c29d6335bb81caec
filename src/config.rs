//! Static configuration embedded from config.toml
//!
//! Holds page selectors, API endpoint and the request/minutes policy
//! constants. User-editable values live in [`crate::settings`].

use crate::error::ConfigError;
use crate::markers::MarkerLanguage;
use serde::Deserialize;
use std::time::Duration;

const CONFIG_TOML: &str = include_str!("../config.toml");

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Config {
    pub(crate) page: PageConfig,
    pub(crate) api: ApiConfig,
    pub(crate) translation: TranslationConfig,
    pub(crate) minutes: MinutesConfig,
}

/// Class names and attributes used on the host page
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PageConfig {
    /// Marker class of caption containers
    pub(crate) caption_class: String,
    /// Class of the overlay elements this system inserts
    pub(crate) overlay_class: String,
    /// Bookkeeping attribute holding the translation state
    pub(crate) state_attribute: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiConfig {
    pub(crate) endpoint: String,
    pub(crate) connect_timeout_secs: u64,
    pub(crate) request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TranslationConfig {
    /// Lower bound of the response token budget
    pub(crate) min_tokens: u32,
    /// Tokens granted per input character
    pub(crate) token_multiplier: f64,
    pub(crate) timeout_secs: u64,
    #[serde(default)]
    pub(crate) marker_language: MarkerLanguage,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MinutesConfig {
    /// Transcripts longer than this keep only their most recent characters
    pub(crate) max_input_chars: usize,
    pub(crate) max_output_tokens: u32,
    pub(crate) timeout_secs: u64,
    pub(crate) subject: String,
}

impl TranslationConfig {
    /// Response token budget for an input of `chars` characters.
    ///
    /// Monotonic non-decreasing in `chars` and never below `min_tokens`.
    pub(crate) fn max_tokens_for(&self, chars: usize) -> u32 {
        let scaled = (chars as f64 * self.token_multiplier).ceil();
        let scaled = if scaled >= u32::MAX as f64 {
            u32::MAX
        } else {
            scaled as u32
        };
        scaled.max(self.min_tokens)
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl MinutesConfig {
    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Load configuration from embedded config.toml
pub(crate) fn load_config() -> Result<Config, ConfigError> {
    parse_config(CONFIG_TOML)
}

fn parse_config(source: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(source)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = url::Url::parse(&self.api.endpoint).map_err(|e| {
            ConfigError::InvalidEndpoint {
                endpoint: self.api.endpoint.clone(),
                reason: e.to_string(),
            }
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint {
                endpoint: self.api.endpoint.clone(),
                reason: format!("unsupported scheme '{}'", endpoint.scheme()),
            });
        }

        if !self.translation.token_multiplier.is_finite() || self.translation.token_multiplier < 0.0
        {
            return Err(ConfigError::Invalid(
                "translation.token_multiplier must be a non-negative number".into(),
            ));
        }
        if self.page.caption_class.is_empty() || self.page.overlay_class.is_empty() {
            return Err(ConfigError::Invalid("page class names must not be empty".into()));
        }
        if self.minutes.max_input_chars == 0 {
            return Err(ConfigError::Invalid(
                "minutes.max_input_chars must be positive".into(),
            ));
        }
        Ok(())
    }
}
