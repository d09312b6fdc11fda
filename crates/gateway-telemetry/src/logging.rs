//! Subscriber installation and log formatting.
//!
//! Filtering follows one rule: a valid `RUST_LOG` wins, otherwise the
//! configured level applies, and configured directives are layered on top
//! of either.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::{
    fmt::{format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Output format of log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Multi-line, human-oriented
    #[default]
    Pretty,
    /// Single-line, human-oriented
    Compact,
}

impl LogFormat {
    /// Lowercase name as used in configuration
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" | "text" => Ok(Self::Compact),
            other => Err(LoggingError::UnknownFormat(other.to_string())),
        }
    }
}

/// Stream log lines are written to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogWriter {
    /// Standard output
    #[default]
    Stdout,
    /// Standard error, keeping stdout free for command output
    Stderr,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Install a subscriber at all
    pub enabled: bool,
    /// Base level (`error`, `warn`, `info`, `debug`, `trace`)
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Include file and line of each event
    pub include_location: bool,
    /// Emit an event when a span closes, with its timing
    pub span_events: bool,
    /// Colored output for the human formats
    pub ansi: bool,
    /// Output stream
    pub writer: LogWriter,
    /// Extra filter directives, e.g. `redis=warn`
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::default(),
            include_location: false,
            span_events: false,
            ansi: true,
            writer: LogWriter::default(),
            directives: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Set the base level
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Set the output format
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a filter directive
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Toggle colored output
    #[must_use]
    pub const fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// Choose the output stream
    #[must_use]
    pub const fn with_writer(mut self, writer: LogWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Filter built from this configuration and an optional `RUST_LOG` value
    ///
    /// # Errors
    /// Returns `LoggingError::FilterParse` when the level or a directive is malformed.
    pub fn filter(&self, rust_log: Option<&str>) -> Result<EnvFilter, LoggingError> {
        let base = rust_log
            .filter(|value| !value.trim().is_empty())
            .and_then(|value| EnvFilter::builder().parse(value).ok());

        let mut filter = match base {
            Some(filter) => filter,
            None => EnvFilter::builder()
                .parse(&self.level)
                .map_err(|e| LoggingError::FilterParse(format!("{}: {e}", self.level)))?,
        };

        for directive in &self.directives {
            let parsed = directive
                .parse()
                .map_err(|e| LoggingError::FilterParse(format!("{directive}: {e}")))?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }
}

/// Map repeated `-v` flags to a level, `None` meaning "use the configured one"
#[must_use]
pub const fn verbosity_level(verbose: u8, quiet: bool) -> Option<&'static str> {
    if quiet {
        return Some("error");
    }
    match verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn format_layer(config: &LoggingConfig) -> BoxedLayer {
    let span_events = if config.span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let writer = match config.writer {
        LogWriter::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogWriter::Stderr => BoxMakeWriter::new(std::io::stderr),
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_span_events(span_events);

    match config.format {
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => layer.pretty().with_ansi(config.ansi).boxed(),
        LogFormat::Compact => layer.compact().with_ansi(config.ansi).boxed(),
    }
}

/// Install the global subscriber
///
/// Does nothing when logging is disabled.
///
/// # Errors
/// Returns error if the filter is malformed or a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    if !config.enabled {
        return Ok(());
    }

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = config.filter(rust_log.as_deref())?;

    tracing_subscriber::registry()
        .with(format_layer(config).with_filter(filter))
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    info!(
        level = %config.level,
        format = %config.format,
        "Logging initialized"
    );
    Ok(())
}

/// Logging setup error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    Init(String),
    /// Level or directive could not be parsed
    #[error("Invalid log filter {0}")]
    FilterParse(String),
    /// Unrecognized format name
    #[error("Unknown log format '{0}', expected json, pretty or compact")]
    UnknownFormat(String),
}
