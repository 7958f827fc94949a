//! AWS credential validation via `aws sts get-caller-identity`

use crate::cli;
use serde::{Deserialize, Serialize};

/// Outcome of a credential check, with enough detail for an actionable hint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialCheckResult {
    pub valid: bool,
    /// Caller ARN when valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    pub sso_expired: bool,
    pub profile_missing: bool,
    pub message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentity {
    arn: String,
}

pub async fn check_credentials(profile: Option<&str>) -> CredentialCheckResult {
    let mut args = vec!["sts", "get-caller-identity", "--output", "json"];
    args.extend(cli::profile_args(profile));

    match cli::output("aws", &args, None).await {
        Ok(out) => classify(out.success, &out.stdout, &out.stderr, profile),
        Err(e) => CredentialCheckResult {
            message: format!("Could not run the aws CLI: {}. Install it from https://aws.amazon.com/cli/", e),
            ..Default::default()
        },
    }
}

/// Interpret the output of `aws sts get-caller-identity`
pub fn classify(
    success: bool,
    stdout: &str,
    stderr: &str,
    profile: Option<&str>,
) -> CredentialCheckResult {
    let login_hint = match profile {
        Some(p) => format!("aws sso login --profile {}", p),
        None => "aws sso login".to_string(),
    };

    if success {
        return match serde_json::from_str::<CallerIdentity>(stdout) {
            Ok(identity) => CredentialCheckResult {
                valid: true,
                message: format!("Authenticated as {}", identity.arn),
                identity: Some(identity.arn),
                ..Default::default()
            },
            Err(e) => CredentialCheckResult {
                message: format!("Unexpected get-caller-identity output: {}", e),
                ..Default::default()
            },
        };
    }

    let lower = stderr.to_lowercase();
    if lower.contains("token has expired")
        || lower.contains("sso session")
        || lower.contains("error loading sso token")
        || lower.contains("refresh failed")
    {
        CredentialCheckResult {
            sso_expired: true,
            message: format!("AWS SSO session has expired. Run: {}", login_hint),
            ..Default::default()
        }
    } else if lower.contains("could not be found") && lower.contains("profile") {
        CredentialCheckResult {
            profile_missing: true,
            message: format!(
                "AWS profile '{}' is not configured. Run: aws configure sso",
                profile.unwrap_or("default")
            ),
            ..Default::default()
        }
    } else if lower.contains("unable to locate credentials") {
        CredentialCheckResult {
            message: format!("No AWS credentials found. Run: {} or aws configure", login_hint),
            ..Default::default()
        }
    } else {
        CredentialCheckResult {
            message: stderr.trim().to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identity() {
        let stdout = r#"{"UserId":"AIDA","Account":"123456789012","Arn":"arn:aws:iam::123456789012:user/dev"}"#;
        let result = classify(true, stdout, "", None);
        assert!(result.valid);
        assert_eq!(
            result.identity.as_deref(),
            Some("arn:aws:iam::123456789012:user/dev")
        );
    }

    #[test]
    fn test_sso_expired() {
        let stderr = "Error when retrieving token from sso: Token has expired and refresh failed";
        let result = classify(false, "", stderr, Some("semiont-prod"));
        assert!(!result.valid);
        assert!(result.sso_expired);
        assert!(result.message.contains("aws sso login --profile semiont-prod"));
    }

    #[test]
    fn test_profile_missing() {
        let stderr = "The config profile (semiont-prod) could not be found";
        let result = classify(false, "", stderr, Some("semiont-prod"));
        assert!(result.profile_missing);
        assert!(!result.sso_expired);
    }

    #[test]
    fn test_unknown_failure_keeps_stderr() {
        let result = classify(false, "", "  something else  \n", None);
        assert!(!result.valid && !result.sso_expired && !result.profile_missing);
        assert_eq!(result.message, "something else");
    }
}
