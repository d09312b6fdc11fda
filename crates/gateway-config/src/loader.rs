//! Configuration loading from files and environment.
//!
//! Sources are read in order and layered: a section that differs from its
//! default replaces the one loaded before it. Environment overrides apply
//! last, then the result is validated.

use crate::schema::GatewayConfig;
use gateway_core::FailureMode;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

/// Prefix of environment overrides read by [`load_config`]
pub const ENV_PREFIX: &str = "STATE_GATEWAY";

#[allow(clippy::expect_used)]
static ENV_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// The path that was looked up
        path: String,
    },

    /// IO error
    #[error("IO error reading configuration: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Configuration validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Unsupported format
    #[error("Unsupported configuration format: {extension}")]
    UnsupportedFormat {
        /// The extension that was not recognized
        extension: String,
    },

    /// `${VAR}` referenced a variable that is not set and has no default
    #[error("Environment variable not found: {name}")]
    EnvVarNotFound {
        /// Variable name
        name: String,
    },

    /// An override variable holds a value of the wrong shape
    #[error("Invalid value '{value}' for {name}")]
    InvalidEnvVar {
        /// Variable name
        name: String,
        /// Offending value
        value: String,
    },
}

/// Configuration source
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// File path; the format follows the extension
    File(String),
    /// Raw YAML string
    Yaml(String),
    /// Raw TOML string
    Toml(String),
    /// Raw JSON string
    Json(String),
    /// Default configuration
    Default,
}

/// Configuration loader
#[derive(Debug, Default)]
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a loader with no sources
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration source
    #[must_use]
    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a file source
    #[must_use]
    pub fn with_file(self, path: impl Into<String>) -> Self {
        self.with_source(ConfigSource::File(path.into()))
    }

    /// Read `<prefix>_*` overrides from the process environment
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Load from every source, then apply overrides from the process environment
    ///
    /// # Errors
    /// Returns error if a source fails to load, an override is malformed or
    /// the result does not validate
    pub async fn load(self) -> Result<GatewayConfig, ConfigError> {
        self.load_with_env(|name| std::env::var(name).ok()).await
    }

    /// Load with an explicit variable lookup
    ///
    /// # Errors
    /// Same as [`ConfigLoader::load`]
    pub async fn load_with_env<F>(self, lookup: F) -> Result<GatewayConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = GatewayConfig::default();

        for source in &self.sources {
            let layer = Self::load_source(source, &lookup).await?;
            config = merge_configs(config, layer);
        }

        if let Some(prefix) = &self.env_prefix {
            apply_env_overrides(&mut config, prefix, &lookup)?;
        }

        config.validate_config()?;

        info!(
            store = %config.store.url,
            failure_mode = %config.failure_mode,
            "Configuration loaded"
        );
        Ok(config)
    }

    async fn load_source<F>(source: &ConfigSource, lookup: &F) -> Result<GatewayConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match source {
            ConfigSource::File(path) => Self::load_file(path, lookup).await,
            ConfigSource::Yaml(content) => parse_yaml(&substitute_env_vars(content, lookup)?),
            ConfigSource::Toml(content) => parse_toml(&substitute_env_vars(content, lookup)?),
            ConfigSource::Json(content) => parse_json(&substitute_env_vars(content, lookup)?),
            ConfigSource::Default => Ok(GatewayConfig::default()),
        }
    }

    async fn load_file<F>(path: &str, lookup: &F) -> Result<GatewayConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = Path::new(path);
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = fs::read_to_string(path).await?;
        let content = substitute_env_vars(&content, lookup)?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        debug!(path = %path.display(), format = %extension, "Parsing configuration file");

        match extension.as_str() {
            "yaml" | "yml" => parse_yaml(&content),
            "toml" => parse_toml(&content),
            "json" => parse_json(&content),
            ext => Err(ConfigError::UnsupportedFormat {
                extension: ext.to_string(),
            }),
        }
    }
}

fn parse_yaml(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(serde_yaml::from_str(content)?)
}

fn parse_toml(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

fn parse_json(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

/// Replace `${VAR}` and `${VAR:-default}` references
fn substitute_env_vars<F>(content: &str, lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(content.len());
    let mut last = 0;

    for caps in ENV_REFERENCE.captures_iter(content) {
        let (Some(whole), Some(spec)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let spec = spec.as_str();
        let (name, default) = match spec.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (spec, None),
        };

        let value = match (lookup(name), default) {
            (Some(value), _) => value,
            (None, Some(default)) => default.to_string(),
            (None, None) => {
                return Err(ConfigError::EnvVarNotFound {
                    name: name.to_string(),
                })
            }
        };

        result.push_str(&content[last..whole.start()]);
        result.push_str(&value);
        last = whole.end();
    }

    result.push_str(&content[last..]);
    Ok(result)
}

fn pick<T: PartialEq + Default>(base: T, overlay: T) -> T {
    if overlay == T::default() {
        base
    } else {
        overlay
    }
}

/// Layer `overlay` on `base`, section by section
fn merge_configs(base: GatewayConfig, overlay: GatewayConfig) -> GatewayConfig {
    GatewayConfig {
        store: pick(base.store, overlay.store),
        cache: pick(base.cache, overlay.cache),
        circuit_breaker: pick(base.circuit_breaker, overlay.circuit_breaker),
        rate_limit: pick(base.rate_limit, overlay.rate_limit),
        session: pick(base.session, overlay.session),
        failure_mode: pick(base.failure_mode, overlay.failure_mode),
        logging: pick(base.logging, overlay.logging),
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvVar {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_failure_mode(name: &str, value: &str) -> Result<FailureMode, ConfigError> {
    match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "fail_open" | "open" => Ok(FailureMode::FailOpen),
        "fail_closed" | "closed" => Ok(FailureMode::FailClosed),
        _ => Err(ConfigError::InvalidEnvVar {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Apply `<prefix>_*` overrides; a bare `REDIS_URL` is honoured when the
/// prefixed one is absent
fn apply_env_overrides<F>(
    config: &mut GatewayConfig,
    prefix: &str,
    lookup: &F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| {
        let name = format!("{prefix}_{suffix}");
        lookup(&name).map(|value| (name, value))
    };

    if let Some((_, url)) = var("REDIS_URL").or_else(|| {
        lookup("REDIS_URL").map(|value| ("REDIS_URL".to_string(), value))
    }) {
        config.store.url = url;
    }

    if let Some((_, level)) = var("LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Some((name, format)) = var("LOG_FORMAT") {
        config.logging.format = parse_var(&name, &format)?;
    }

    if let Some((name, mode)) = var("FAILURE_MODE") {
        config.failure_mode = parse_failure_mode(&name, &mode)?;
    }

    if let Some((name, enabled)) = var("CACHE_ENABLED") {
        config.cache.enabled = parse_var(&name, &enabled)?;
    }

    if let Some((name, max)) = var("RATE_LIMIT_MAX_REQUESTS") {
        config.rate_limit.max_requests = parse_var(&name, &max)?;
    }

    if let Some((name, secs)) = var("RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.window = Duration::from_secs(parse_var(&name, &secs)?);
    }

    if let Some((name, threshold)) = var("CIRCUIT_FAILURE_THRESHOLD") {
        config.circuit_breaker.failure_threshold = parse_var(&name, &threshold)?;
    }

    Ok(())
}

/// Load configuration from default locations
///
/// Looks for configuration in order:
/// 1. Path from `CONFIG_PATH` environment variable
/// 2. ./config.yaml
/// 3. ./config/default.yaml
///
/// Falls back to defaults plus environment overrides when no file exists.
///
/// # Errors
/// Returns error if the selected file fails to parse or validate
pub async fn load_config() -> Result<GatewayConfig, ConfigError> {
    let search_paths = match std::env::var("CONFIG_PATH") {
        Ok(path) => vec![path],
        Err(_) => vec![
            "config.yaml".to_string(),
            "config.yml".to_string(),
            "config/default.yaml".to_string(),
        ],
    };

    let loader = ConfigLoader::new().with_env_prefix(ENV_PREFIX);
    for path in search_paths {
        if Path::new(&path).exists() {
            info!(path = %path, "Loading configuration");
            return loader.with_file(path).load().await;
        }
    }

    warn!("No configuration file found, using defaults");
    loader.with_source(ConfigSource::Default).load().await
}
