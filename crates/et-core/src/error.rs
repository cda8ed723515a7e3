//! Typed error definitions for the trigger system.
//!
//! [`EtError`] covers the failures that callers need to tell apart (a
//! transport that can no longer send vs. a malformed payload vs. bad user
//! input). Everything else travels as `anyhow::Error`; since `EtError`
//! implements `std::error::Error` it converts into `anyhow` with `?`.

use thiserror::Error;

use crate::token::CorrelationToken;

/// Domain-specific errors for the trigger system.
#[derive(Debug, Error)]
pub enum EtError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// A command-line or instrument parameter was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The session transport could not accept an operation.
    #[error("transport error: {0}")]
    Transport(String),

    /// An inbound payload could not be interpreted.
    #[error("parse error: {0}")]
    Parse(String),

    /// The dispatch queue is closed or the worker is gone.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// A correlation token was registered twice.
    #[error("correlation token {0} already registered")]
    Registry(CorrelationToken),
}
