//! docker / podman CLI wrapper

use crate::error::{ContainerError, Result};
use crate::parse::{self, INSPECT_FORMAT, InspectState};
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::process::Command;

const CANDIDATES: &[&str] = &["docker", "podman"];

/// Everything `run -d` needs
#[derive(Debug, Clone, Default)]
pub struct RunSpec {
    pub name: String,
    pub image: String,
    pub ports: Vec<u16>,
    pub env: BTreeMap<String, String>,
    /// `(source, target)`: a named volume or host path mounted at target
    pub mounts: Vec<(String, String)>,
    pub command: Option<String>,
    pub cpus: Option<String>,
    pub memory: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl RunSpec {
    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--restart".to_string(),
            "unless-stopped".to_string(),
        ];
        for port in &self.ports {
            args.push("-p".to_string());
            args.push(format!("{}:{}", port, port));
        }
        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        for (source, target) in &self.mounts {
            args.push("-v".to_string());
            args.push(format!("{}:{}", source, target));
        }
        for (key, value) in &self.labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", key, value));
        }
        if let Some(cpus) = &self.cpus {
            args.push("--cpus".to_string());
            args.push(cpus.clone());
        }
        if let Some(memory) = &self.memory {
            args.push("--memory".to_string());
            args.push(memory.clone());
        }
        args.push(self.image.clone());
        if let Some(command) = &self.command {
            args.extend(["sh".to_string(), "-c".to_string(), command.clone()]);
        }
        args
    }
}

/// Raw outcome of a CLI call that may legitimately fail
#[derive(Debug, Clone)]
pub struct CliOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// A container CLI (`docker` or `podman`)
#[derive(Debug, Clone)]
pub struct ContainerRuntime {
    binary: String,
}

impl ContainerRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// First runtime whose `version` command succeeds, docker preferred
    pub async fn detect() -> Result<Self> {
        for candidate in CANDIDATES {
            let ok = Command::new(candidate)
                .args(["version", "--format", "{{.Client.Version}}"])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map(|s| s.success())
                .unwrap_or(false);
            if ok {
                tracing::debug!("Using container runtime: {}", candidate);
                return Ok(Self::new(*candidate));
            }
        }
        Err(ContainerError::RuntimeNotFound)
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run a command, returning whatever happened
    pub async fn output<S: AsRef<str>>(&self, args: &[S]) -> Result<CliOutput> {
        let args: Vec<&str> = args.iter().map(|a| a.as_ref()).collect();
        tracing::debug!("Running: {} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        Ok(CliOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run a command and return stdout; non-zero exit is an error
    async fn run_command<S: AsRef<str>>(&self, args: &[S]) -> Result<String> {
        let out = self.output(args).await?;
        if !out.success {
            let subcommand: &str = args.first().map(|a| a.as_ref()).unwrap_or_default();
            let command = format!("{} {}", self.binary, subcommand);
            return Err(ContainerError::CommandFailed {
                command,
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(out.stdout)
    }

    /// Container state, `None` when no such container exists
    pub async fn inspect(&self, name: &str) -> Result<Option<InspectState>> {
        let out = self
            .output(&["inspect", "--format", INSPECT_FORMAT, name])
            .await?;
        if !out.success {
            if is_missing(&out.stderr) {
                return Ok(None);
            }
            return Err(ContainerError::CommandFailed {
                command: format!("{} inspect", self.binary),
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(Some(parse::parse_inspect(&out.stdout)?))
    }

    /// Start a detached container, returning its id
    pub async fn run(&self, spec: &RunSpec) -> Result<String> {
        let args = spec.args();
        let id = self.run_command(args.as_slice()).await?;
        Ok(id.trim().to_string())
    }

    pub async fn stop(&self, name: &str, timeout_secs: u64) -> Result<()> {
        let timeout = timeout_secs.to_string();
        self.run_command(&["stop", "-t", timeout.as_str(), name])
            .await?;
        Ok(())
    }

    /// Remove a container; a missing one is not an error
    pub async fn remove(&self, name: &str, force: bool) -> Result<()> {
        let mut args = vec!["rm"];
        if force {
            args.push("-f");
        }
        args.push(name);
        let out = self.output(args.as_slice()).await?;
        if !out.success && !is_missing(&out.stderr) {
            return Err(ContainerError::CommandFailed {
                command: format!("{} rm", self.binary),
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    pub async fn ports(&self, name: &str) -> Result<BTreeMap<u16, u16>> {
        let out = self.run_command(&["port", name]).await?;
        Ok(parse::parse_ports(&out)?)
    }

    /// Last `tail` log lines, stdout and stderr interleaved
    pub async fn logs(&self, name: &str, tail: usize) -> Result<String> {
        let tail = tail.to_string();
        let out = self
            .output(&["logs", "--timestamps", "--tail", tail.as_str(), name])
            .await?;
        if !out.success {
            return Err(ContainerError::ContainerNotFound {
                container: name.to_string(),
            });
        }
        Ok(format!("{}{}", out.stdout, out.stderr))
    }

    pub async fn pull(&self, image: &str) -> Result<()> {
        self.run_command(&["pull", image]).await?;
        Ok(())
    }

    pub async fn build(&self, tag: &str, dockerfile: Option<&str>, context: &str) -> Result<()> {
        let mut args = vec!["build", "-t", tag];
        if let Some(dockerfile) = dockerfile {
            args.extend(["-f", dockerfile]);
        }
        args.push(context);
        self.run_command(args.as_slice()).await?;
        Ok(())
    }

    pub async fn push(&self, tag: &str) -> Result<()> {
        self.run_command(&["push", tag]).await?;
        Ok(())
    }

    /// `exec <name> sh -c <command>`
    pub async fn exec(&self, name: &str, command: &str) -> Result<CliOutput> {
        self.output(&["exec", name, "sh", "-c", command]).await
    }

    /// Create a named volume; existing volumes are left alone
    pub async fn volume_create(&self, volume: &str) -> Result<()> {
        let exists = self.output(&["volume", "inspect", volume]).await?.success;
        if !exists {
            self.run_command(&["volume", "create", volume]).await?;
            tracing::info!("Created volume {}", volume);
        }
        Ok(())
    }

    /// Run a throwaway container to completion
    pub async fn run_oneshot(
        &self,
        image: &str,
        mounts: &[(String, String)],
        command: &str,
    ) -> Result<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string()];
        for (source, target) in mounts {
            args.push("-v".to_string());
            args.push(format!("{}:{}", source, target));
        }
        args.extend([
            image.to_string(),
            "sh".to_string(),
            "-c".to_string(),
            command.to_string(),
        ]);
        self.run_command(args.as_slice()).await
    }
}

fn is_missing(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("no such container")
        || stderr.contains("no such object")
        || stderr.contains("no container with name")
}
