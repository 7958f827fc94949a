use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Project root not found (searched upwards from {0})\n\
        Hint: run inside a directory containing semiont.json, pass --root, or set SEMIONT_ROOT"
    )]
    ProjectRootNotFound(PathBuf),

    #[error(
        "No environment specified. Use --environment <name> or set SEMIONT_ENV\nAvailable environments: {}",
        format_available(.available)
    )]
    EnvironmentNotSpecified { available: Vec<String> },

    #[error(
        "Environment '{name}' not found\nAvailable environments: {}",
        format_available(.available)
    )]
    EnvironmentNotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("Invalid configuration file {path}: {message}")]
    InvalidFile { path: PathBuf, message: String },

    #[error("Unknown service '{name}'. Known services: {}", .known.join(", "))]
    UnknownService { name: String, known: Vec<String> },

    #[error("Refusing to overwrite existing {0} (use --force)")]
    AlreadyInitialized(PathBuf),

    #[error(transparent)]
    Core(#[from] semiont_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "(none; run `semiont init`)".to_string()
    } else {
        available.join(", ")
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
