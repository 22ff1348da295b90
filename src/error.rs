//! Shared error type for the whole crate.
//!
//! Most RHI operations do not return `Result` at all: capacity
//! exhaustion and state misuse are treated as fatal by design (see module
//! docs on [`crate::handle`] and [`crate::command`]) and surface as panics
//! or debug assertions rather than recoverable errors. `RhiError` exists for
//! the paths that *are* recoverable: configuration validation and
//! transient content load failures (shader compile errors, missing files),
//! where the caller substitutes a sentinel resource and keeps running.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RhiError {
    #[error("out of capacity in {subsystem}: requested beyond capacity {capacity}")]
    OutOfCapacity { subsystem: &'static str, capacity: u32 },

    #[error("invalid handle used in {context}")]
    InvalidHandle { context: &'static str },

    #[error("state misuse in {context}: {detail}")]
    StateMisuse {
        context: &'static str,
        detail: String,
    },

    #[error("device removed: {0}")]
    DeviceRemoved(String),

    #[error("failed to load {kind} '{name}': {detail}")]
    TransientLoadFailure {
        kind: &'static str,
        name: String,
        detail: String,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, RhiError>;
