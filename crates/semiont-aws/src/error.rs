//! AWS platform error types

use aws_sdk_cloudformation::error::DisplayErrorContext;
use semiont_platform::PlatformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("Environment '{0}' has no aws.region configured")]
    MissingRegion(String),

    #[error("No CloudFormation stack configured for service '{0}' (set aws.stacks in the environment file)")]
    MissingStack(String),

    #[error("Could not discover {resource} for service '{service}'. Run `semiont provision` or retry with --force-discovery")]
    NotDiscovered { service: String, resource: String },

    #[error("{operation} failed: {message}")]
    Sdk { operation: String, message: String },

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("AWS credentials are not usable: {0}")]
    Credentials(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AwsError {
    pub fn sdk(operation: &str, err: impl std::error::Error) -> Self {
        AwsError::Sdk {
            operation: operation.to_string(),
            message: DisplayErrorContext(err).to_string(),
        }
    }
}

impl From<AwsError> for PlatformError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::MissingRegion(_) | AwsError::MissingStack(_) => {
                PlatformError::InvalidConfig(err.to_string())
            }
            AwsError::NotDiscovered { .. } => PlatformError::NotFound(err.to_string()),
            AwsError::Io(e) => PlatformError::Io(e),
            AwsError::Json(e) => PlatformError::Json(e),
            other => PlatformError::CommandFailed(other.to_string()),
        }
    }
}

/// Why a CloudFormation lookup produced nothing
///
/// `NotFound` and `AccessDenied` mean "no resource here" and are skipped
/// quietly; `Malformed` and `Api` are worth a log line but still never
/// abort a discovery pass.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiscoveryError {
    #[error("stack {0} not found")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("api error: {0}")]
    Api(String),
}

impl DiscoveryError {
    pub fn is_ignorable(&self) -> bool {
        matches!(self, DiscoveryError::NotFound(_) | DiscoveryError::AccessDenied(_))
    }

    /// Level a skipped lookup is logged at
    pub fn log_level(&self) -> tracing::Level {
        if self.is_ignorable() {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        }
    }

    /// Classify an SDK error by its AWS error code and message
    pub fn classify(stack: &str, code: Option<&str>, message: Option<&str>) -> Self {
        let message = message.unwrap_or_default();
        match code {
            Some("ValidationError") if message.contains("does not exist") => {
                DiscoveryError::NotFound(stack.to_string())
            }
            Some(code)
                if code.starts_with("AccessDenied")
                    || code == "UnauthorizedOperation"
                    || code == "ExpiredToken" =>
            {
                DiscoveryError::AccessDenied(format!("{}: {}", code, message))
            }
            Some(code) => DiscoveryError::Api(format!("{}: {}", code, message)),
            None => DiscoveryError::Api(message.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_missing_stack() {
        let err = DiscoveryError::classify(
            "SemiontAppStack",
            Some("ValidationError"),
            Some("Stack with id SemiontAppStack does not exist"),
        );
        assert_eq!(err, DiscoveryError::NotFound("SemiontAppStack".into()));
        assert!(err.is_ignorable());
    }

    #[test]
    fn test_classify_access_denied() {
        let err = DiscoveryError::classify("s", Some("AccessDenied"), Some("not authorized"));
        assert!(matches!(err, DiscoveryError::AccessDenied(_)));
        assert!(err.is_ignorable());
    }

    #[test]
    fn test_classify_other() {
        let err = DiscoveryError::classify("s", Some("Throttling"), Some("Rate exceeded"));
        assert_eq!(err, DiscoveryError::Api("Throttling: Rate exceeded".into()));
        assert!(!err.is_ignorable());
        assert!(!DiscoveryError::Malformed("x".into()).is_ignorable());
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(
            DiscoveryError::NotFound("AppStack".into()).log_level(),
            tracing::Level::DEBUG
        );
        assert_eq!(
            DiscoveryError::AccessDenied("denied".into()).log_level(),
            tracing::Level::DEBUG
        );
        assert_eq!(
            DiscoveryError::Api("Throttling".into()).log_level(),
            tracing::Level::WARN
        );
        assert_eq!(
            DiscoveryError::Malformed("no id".into()).log_level(),
            tracing::Level::WARN
        );
    }

    #[test]
    fn test_into_platform_error() {
        let err: PlatformError = AwsError::MissingRegion("prod".into()).into();
        assert!(matches!(err, PlatformError::InvalidConfig(_)));
    }
}
