use semiont_platform::PlatformError;
use thiserror::Error;

/// Failure to make sense of container CLI output
///
/// Scraping `docker inspect`/`port`/`logs` text is best effort; callers
/// degrade to `status: unknown` instead of failing the verb.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutputParseError {
    #[error("empty output from {what}")]
    Empty { what: &'static str },

    #[error("unrecognised {what} output: {line}")]
    Unrecognized { what: &'static str, line: String },
}

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error(
        "No container runtime found\n\nHint:\n  • Install Docker or Podman\n  • Make sure the daemon is running (`docker info`)"
    )]
    RuntimeNotFound,

    #[error("Container '{container}' not found")]
    ContainerNotFound { container: String },

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error(transparent)]
    Parse(#[from] OutputParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ContainerError> for PlatformError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::ContainerNotFound { container } => PlatformError::NotFound(container),
            ContainerError::Io(e) => PlatformError::Io(e),
            other => PlatformError::CommandFailed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
