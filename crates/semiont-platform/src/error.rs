//! Platform error types

use semiont_core::{PlatformType, Verb};
use thiserror::Error;

/// Errors raised inside a platform verb
///
/// These never escape [`crate::dispatch`]; they become a failed
/// [`crate::CommandResult`] carrying the message.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error(transparent)]
    Core(#[from] semiont_core::CoreError),

    #[error("{verb} is not supported on the {platform} platform")]
    Unsupported { platform: PlatformType, verb: Verb },

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Simulated failure: {0}")]
    Injected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlatformError>;
