//! # Gateway Telemetry
//!
//! Structured logging for the LLM State Gateway.
//!
//! Every component logs through `tracing`; this crate owns the one place a
//! subscriber gets installed, so binaries and test harnesses share the same
//! formats and filtering rules.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;

// Re-export main types
pub use logging::{
    init_logging, verbosity_level, LogFormat, LogWriter, LoggingConfig, LoggingError,
};
