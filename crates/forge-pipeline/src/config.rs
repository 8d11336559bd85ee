//! Configuration types for the Interview Forge service.
//!
//! This module provides all configuration structures used to control the
//! HTTP server, the generation provider, the per-item retry policy and the
//! progress stream.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "forge.json";

/// Hard upper bound on items per job, regardless of configuration.
pub const MAX_ITEMS_LIMIT: usize = 100;

/// Upper bound for configured sleeps between attempts and items.
const MAX_DELAY_MS: u64 = 5000;

/// Accepted idle window between keep-alive frames, in seconds.
const KEEP_ALIVE_RANGE_SECONDS: std::ops::RangeInclusive<u64> = 30..=45;

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    10000
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

const fn default_request_timeout() -> u64 {
    120
}

const fn default_connect_timeout() -> u64 {
    10
}

const fn default_max_attempts() -> u32 {
    2
}

const fn default_retry_backoff_ms() -> u64 {
    1000
}

const fn default_pacing_delay_ms() -> u64 {
    200
}

const fn default_max_items() -> usize {
    50
}

const fn default_total_items() -> usize {
    10
}

fn default_difficulty_levels() -> Vec<String> {
    vec![
        "Beginner".to_string(),
        "Intermediate".to_string(),
        "Advanced".to_string(),
    ]
}

const fn default_category_balance() -> f64 {
    0.5
}

const fn default_keep_alive_seconds() -> u64 {
    45
}

const fn default_job_ttl_seconds() -> u64 {
    900
}

const fn default_sweep_interval_seconds() -> u64 {
    60
}

/// Main configuration for the Interview Forge service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Text-generation provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Per-item retry policy, pacing and request defaults.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Progress stream and job retention settings.
    #[serde(default)]
    pub stream: StreamConfig,
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `forge.json` in the current directory. If not found,
    /// returns the default configuration.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            ForgeError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `forge.json` in a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::ConfigParseError` if the file exists but contains
    /// invalid JSON, and `ForgeError::ConfigValidationError` if the values
    /// are out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(ForgeError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ForgeError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(ForgeError::config_validation(
                "server.host must not be empty",
                "Set server.host to an interface address such as 127.0.0.1",
            ));
        }

        self.provider.validate()?;
        self.generation.validate()?;
        self.stream.validate()
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Text-generation provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Model name used for every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the provider API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Total timeout for one generation request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Connection timeout, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            request_timeout_seconds: default_request_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl ProviderConfig {
    fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ForgeError::config_validation(
                "provider.model must not be empty",
                "Set provider.model to a model name such as gemini-1.5-flash",
            ));
        }

        if self.base_url.trim().is_empty() {
            return Err(ForgeError::config_validation(
                "provider.baseUrl must not be empty",
                "Remove provider.baseUrl from forge.json to use the default endpoint",
            ));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(ForgeError::config_validation(
                "provider.apiKeyEnv must not be empty",
                "Set provider.apiKeyEnv to the environment variable holding your API key",
            ));
        }

        if self.request_timeout_seconds == 0 || self.connect_timeout_seconds == 0 {
            return Err(ForgeError::config_validation(
                "provider timeouts must be greater than 0",
                "Set provider.requestTimeoutSeconds and provider.connectTimeoutSeconds to at least 1",
            ));
        }

        Ok(())
    }

    /// Returns the request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Returns the connect timeout as a [`Duration`].
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Per-item retry policy, pacing and defaults for generation requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Attempts per item before the slot is given up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Sleep between attempts of the same item, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Constant throttle after every item, in milliseconds.
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,

    /// Largest accepted `totalItems` in a request.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// `totalItems` used when a request omits it.
    #[serde(default = "default_total_items")]
    pub default_total_items: usize,

    /// Difficulty levels used when a request omits them.
    #[serde(default = "default_difficulty_levels")]
    pub default_difficulty_levels: Vec<String>,

    /// Category balance used when a request omits it.
    #[serde(default = "default_category_balance")]
    pub default_category_balance: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            pacing_delay_ms: default_pacing_delay_ms(),
            max_items: default_max_items(),
            default_total_items: default_total_items(),
            default_difficulty_levels: default_difficulty_levels(),
            default_category_balance: default_category_balance(),
        }
    }
}

impl GenerationConfig {
    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ForgeError::config_validation(
                "generation.maxAttempts must be greater than 0",
                "Set generation.maxAttempts to at least 1 in your forge.json",
            ));
        }

        if self.retry_backoff_ms > MAX_DELAY_MS || self.pacing_delay_ms > MAX_DELAY_MS {
            return Err(ForgeError::config_validation(
                format!(
                    "generation.retryBackoffMs and generation.pacingDelayMs must be at most {MAX_DELAY_MS}"
                ),
                "Use short delays; long pauses hold a job open without reducing quota use",
            ));
        }

        if self.max_items == 0 || self.max_items > MAX_ITEMS_LIMIT {
            return Err(ForgeError::config_validation(
                format!("generation.maxItems must be between 1 and {MAX_ITEMS_LIMIT}"),
                "Set generation.maxItems to a value such as 50",
            ));
        }

        if self.default_total_items == 0 || self.default_total_items > self.max_items {
            return Err(ForgeError::config_validation(
                "generation.defaultTotalItems must be between 1 and generation.maxItems",
                "Lower generation.defaultTotalItems or raise generation.maxItems",
            ));
        }

        if self.default_difficulty_levels.is_empty()
            || self
                .default_difficulty_levels
                .iter()
                .any(|level| level.trim().is_empty())
        {
            return Err(ForgeError::config_validation(
                "generation.defaultDifficultyLevels must list at least one non-empty level",
                "Use levels such as [\"Beginner\", \"Intermediate\", \"Advanced\"]",
            ));
        }

        if !(0.0..=1.0).contains(&self.default_category_balance) {
            return Err(ForgeError::config_validation(
                "generation.defaultCategoryBalance must be between 0 and 1",
                "Use 0.5 for an even theory/practical split",
            ));
        }

        Ok(())
    }

    /// Returns the runtime settings for item generation.
    #[must_use]
    pub const fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            max_attempts: self.max_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            pacing_delay: Duration::from_millis(self.pacing_delay_ms),
        }
    }
}

/// Runtime form of the retry and pacing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSettings {
    /// Attempts per item before the slot is given up.
    pub max_attempts: u32,
    /// Sleep between attempts of the same item.
    pub retry_backoff: Duration,
    /// Constant throttle after every item.
    pub pacing_delay: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        GenerationConfig::default().settings()
    }
}

/// Progress stream and job retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    /// Idle window after which a keep-alive is sent to the subscriber.
    #[serde(default = "default_keep_alive_seconds")]
    pub keep_alive_seconds: u64,

    /// Age after which an unsubscribed job is dropped. `0` disables the sweep.
    #[serde(default = "default_job_ttl_seconds")]
    pub job_ttl_seconds: u64,

    /// How often the sweeper runs.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            keep_alive_seconds: default_keep_alive_seconds(),
            job_ttl_seconds: default_job_ttl_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

impl StreamConfig {
    fn validate(&self) -> Result<()> {
        if !KEEP_ALIVE_RANGE_SECONDS.contains(&self.keep_alive_seconds) {
            return Err(ForgeError::config_validation(
                format!(
                    "stream.keepAliveSeconds must be between {} and {}, got {}",
                    KEEP_ALIVE_RANGE_SECONDS.start(),
                    KEEP_ALIVE_RANGE_SECONDS.end(),
                    self.keep_alive_seconds
                ),
                "Keep it below your proxy's idle timeout; 45 works for most setups",
            ));
        }

        if self.sweep_interval_seconds == 0 {
            return Err(ForgeError::config_validation(
                "stream.sweepIntervalSeconds must be greater than 0",
                "Set stream.sweepIntervalSeconds to at least 1, or set stream.jobTtlSeconds to 0 to disable sweeping",
            ));
        }

        Ok(())
    }

    /// Returns the keep-alive window as a [`Duration`].
    #[must_use]
    pub const fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_seconds)
    }

    /// Returns the job TTL, or `None` when sweeping is disabled.
    #[must_use]
    pub const fn job_ttl(&self) -> Option<Duration> {
        if self.job_ttl_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.job_ttl_seconds))
        }
    }

    /// Returns the sweep interval as a [`Duration`].
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 10000);
        assert_eq!(config.provider.model, "gemini-1.5-flash");
        assert_eq!(config.provider.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.generation.max_attempts, 2);
        assert_eq!(config.generation.max_items, 50);
        assert_eq!(config.generation.default_total_items, 10);
        assert_eq!(
            config.generation.default_difficulty_levels,
            vec!["Beginner", "Intermediate", "Advanced"]
        );
        assert!((config.generation.default_category_balance - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.stream.keep_alive_seconds, 45);
        assert_eq!(config.stream.job_ttl_seconds, 900);
    }

    #[test]
    fn test_generation_settings_from_config() {
        let settings = GenerationConfig::default().settings();

        assert_eq!(settings.max_attempts, 2);
        assert_eq!(settings.retry_backoff, Duration::from_millis(1000));
        assert_eq!(settings.pacing_delay, Duration::from_millis(200));
        assert_eq!(settings, GenerationSettings::default());
    }

    #[test]
    fn test_stream_durations() {
        let stream = StreamConfig::default();
        assert_eq!(stream.keep_alive(), Duration::from_secs(45));
        assert_eq!(stream.job_ttl(), Some(Duration::from_secs(900)));
        assert_eq!(stream.sweep_interval(), Duration::from_secs(60));

        let no_sweep = StreamConfig {
            job_ttl_seconds: 0,
            ..Default::default()
        };
        assert_eq!(no_sweep.job_ttl(), None);
    }

    #[test]
    fn test_config_deserialization_with_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.server.port, 10000);
        assert_eq!(config.generation.max_attempts, 2);
    }

    #[test]
    fn test_config_deserialization_with_overrides() {
        let json = r#"{
            "server": { "port": 8080 },
            "provider": { "model": "gemini-pro" },
            "generation": { "maxAttempts": 4, "pacingDelayMs": 0 },
            "stream": { "keepAliveSeconds": 30 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.provider.model, "gemini-pro");
        assert_eq!(config.generation.max_attempts, 4);
        assert_eq!(config.generation.pacing_delay_ms, 0);
        assert_eq!(config.generation.retry_backoff_ms, 1000);
        assert_eq!(config.stream.keep_alive_seconds, 30);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{ "server": { "port": 9000 }, "legacyField": true }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_load_from_file_valid_json() {
        use std::io::Write;

        let config_path = std::env::temp_dir().join("test_forge_valid.json");
        let json = r#"{ "generation": { "maxItems": 80, "defaultTotalItems": 20 } }"#;
        let mut file = std::fs::File::create(&config_path).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.generation.max_items, 80);
        assert_eq!(config.generation.default_total_items, 20);

        std::fs::remove_file(&config_path).ok();
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        use std::io::Write;

        let config_path = std::env::temp_dir().join("test_forge_invalid.json");
        let mut file = std::fs::File::create(&config_path).unwrap();
        file.write_all(b"{ not valid json }").unwrap();

        let err = Config::load_from_file(&config_path).unwrap_err();
        assert!(
            matches!(&err, ForgeError::ConfigParseError { path, message } if *path == config_path && !message.is_empty()),
            "Expected ConfigParseError with correct path, got: {err:?}"
        );

        std::fs::remove_file(&config_path).ok();
    }

    #[test]
    fn test_load_from_file_nonexistent_returns_default() {
        let path = PathBuf::from("/nonexistent/path/forge.json");
        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.server.port, 10000);
    }

    #[test]
    fn test_load_from_file_validates_after_parsing() {
        use std::io::Write;

        let config_path = std::env::temp_dir().join("test_forge_validation.json");
        let mut file = std::fs::File::create(&config_path).unwrap();
        file.write_all(br#"{ "generation": { "maxAttempts": 0 } }"#)
            .unwrap();

        let err = Config::load_from_file(&config_path).unwrap_err();
        assert!(
            matches!(&err, ForgeError::ConfigValidationError { .. }),
            "Expected ConfigValidationError, got: {err:?}"
        );

        std::fs::remove_file(&config_path).ok();
    }

    #[test]
    fn test_validation_rejects_out_of_range_values() {
        let cases = [
            Config {
                generation: GenerationConfig {
                    max_items: 101,
                    ..Default::default()
                },
                ..Default::default()
            },
            Config {
                generation: GenerationConfig {
                    default_total_items: 60,
                    ..Default::default()
                },
                ..Default::default()
            },
            Config {
                generation: GenerationConfig {
                    default_category_balance: 1.5,
                    ..Default::default()
                },
                ..Default::default()
            },
            Config {
                generation: GenerationConfig {
                    default_difficulty_levels: vec![],
                    ..Default::default()
                },
                ..Default::default()
            },
            Config {
                generation: GenerationConfig {
                    pacing_delay_ms: 60_000,
                    ..Default::default()
                },
                ..Default::default()
            },
            Config {
                stream: StreamConfig {
                    keep_alive_seconds: 0,
                    ..Default::default()
                },
                ..Default::default()
            },
            Config {
                provider: ProviderConfig {
                    model: "  ".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            },
        ];

        for config in cases {
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, ForgeError::ConfigValidationError { .. }),
                "Expected ConfigValidationError, got: {err:?}"
            );
        }
    }

    #[test]
    fn test_keep_alive_window_bounds() {
        for (seconds, ok) in [(29, false), (30, true), (45, true), (46, false), (300, false)] {
            let config = Config {
                stream: StreamConfig {
                    keep_alive_seconds: seconds,
                    ..Default::default()
                },
                ..Default::default()
            };
            assert_eq!(config.validate().is_ok(), ok, "keepAliveSeconds = {seconds}");
        }
    }

    #[test]
    fn test_validation_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }
}
