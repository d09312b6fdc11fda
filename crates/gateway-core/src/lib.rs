//! # Gateway Core
//!
//! Core types, traits, and error handling for the LLM State Gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Chat request and response types
//! - Conversation turns and cached result payloads
//! - The upstream text generation seam
//! - Error types and their HTTP mapping

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod provider;
pub mod request;
pub mod response;
pub mod types;

// Re-export commonly used types
pub use error::{ApiError, ApiErrorResponse, GatewayError, GatewayResult};
pub use provider::{Generation, TextGenerator};
pub use request::ChatRequest;
pub use response::ChatResponse;
pub use types::{ChatTurn, FailureMode, MessageRole, ResultPayload};
