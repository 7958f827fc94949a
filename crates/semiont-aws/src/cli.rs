//! Subprocess wrapper for the `aws`, `cdk` and `docker` CLIs

use crate::error::{AwsError, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Raw outcome of a CLI call
#[derive(Debug, Clone)]
pub struct CliOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Run `program args...` in `cwd`, capturing output
pub async fn output(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<CliOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }

    tracing::debug!("Running: {} {}", program, args.join(" "));

    let output = cmd.output().await?;
    Ok(CliOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Like [`output`] but a non-zero exit is an error; returns stdout
pub async fn run(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<String> {
    let out = output(program, args, cwd).await?;
    if !out.success {
        return Err(AwsError::CommandFailed {
            command: format!("{} {}", program, args.first().copied().unwrap_or_default()),
            stderr: out.stderr.trim().to_string(),
        });
    }
    Ok(out.stdout)
}

/// Run `program args...` attached to the caller's terminal
///
/// For commands that need a TTY, such as the session-manager plugin behind
/// `aws ecs execute-command`. Returns the exit code.
pub async fn attached(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<Option<i32>> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::inherit());
    cmd.stdout(Stdio::inherit());
    cmd.stderr(Stdio::inherit());
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }

    tracing::debug!("Running (attached): {} {}", program, args.join(" "));

    let status = cmd.status().await?;
    Ok(status.code())
}

/// `--profile <name>` arguments when a profile is configured
pub fn profile_args(profile: Option<&str>) -> Vec<&str> {
    match profile {
        Some(profile) => vec!["--profile", profile],
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = run("sh", &["-c", "echo hello"], None).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_reports_stderr() {
        let err = run("sh", &["-c", "echo boom >&2; exit 3"], None)
            .await
            .unwrap_err();
        match err {
            AwsError::CommandFailed { command, stderr } => {
                assert_eq!(command, "sh -c");
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_attached_returns_exit_code() {
        assert_eq!(attached("sh", &["-c", "exit 0"], None).await.unwrap(), Some(0));
        assert_eq!(attached("sh", &["-c", "exit 4"], None).await.unwrap(), Some(4));
    }

    #[test]
    fn test_profile_args() {
        assert!(profile_args(None).is_empty());
        assert_eq!(profile_args(Some("dev")), vec!["--profile", "dev"]);
    }
}
