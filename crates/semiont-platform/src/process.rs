//! Host process platform
//!
//! Services run as detached `sh -c <command>` process groups with output
//! appended to `.semiont/logs/<env>/<service>.log`. The pid lives in the
//! service's state file; liveness is always re-checked with signal 0.

use crate::archive;
use crate::error::{PlatformError, Result};
use crate::port::{ensure_port_available, find_pids_by_port, is_process_alive, kill_process_gracefully};
use crate::result::{
    BackupDetails, CheckDetails, CommandResult, ExecDetails, LogSummary, PlatformResources,
    ProvisionDetails, PublishDetails, RestoreDetails, ServiceStatus, StartDetails, StopDetails,
    TestDetails, UpdateDetails, VerbDetails,
};
use crate::secrets::{LocalSecretStore, SecretAction, SecretOutcome};
use crate::state::{ServiceState, StateManager};
use crate::strategy::{PlatformStrategy, VerbOptions};
use async_trait::async_trait;
use chrono::Utc;
use semiont_core::{PlatformType, ServiceContext, ServiceKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

const LOG_TAIL: usize = 10;

pub struct ProcessPlatform {
    project_root: PathBuf,
    environment: String,
    state: StateManager,
    secrets: LocalSecretStore,
}

impl ProcessPlatform {
    pub fn new(project_root: &Path, environment: &str) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            environment: environment.to_string(),
            state: StateManager::new(project_root),
            secrets: LocalSecretStore::new(project_root, environment),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    fn working_dir(&self, ctx: &ServiceContext<'_>) -> PathBuf {
        match &ctx.service.config().path {
            Some(path) if ctx.service.kind() != ServiceKind::Filesystem => self.resolve(path),
            _ => self.project_root.clone(),
        }
    }

    fn log_path(&self, service: &str) -> PathBuf {
        self.project_root
            .join(".semiont/logs")
            .join(&self.environment)
            .join(format!("{}.log", service))
    }

    fn backup_dir(&self) -> PathBuf {
        self.project_root
            .join(".semiont/backups")
            .join(&self.environment)
    }

    /// Host directories holding the service's persistent data
    fn data_dirs(&self, ctx: &ServiceContext<'_>) -> Vec<PathBuf> {
        let config = ctx.service.config();
        if ctx.service.kind() == ServiceKind::Filesystem {
            if let Some(path) = &config.path {
                return vec![self.resolve(path)];
            }
        }
        ctx.requirements
            .persistent_storage()
            .filter_map(|s| s.mount_path.as_deref())
            .map(|p| self.resolve(p))
            .collect()
    }

    /// Service variables, with requirement defaults underneath
    fn env_vars(&self, ctx: &ServiceContext<'_>) -> HashMap<String, String> {
        let mut vars = ctx.service.environment_variables();
        if let Some(defaults) = &ctx.requirements.environment {
            for (key, value) in defaults {
                vars.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        vars
    }

    async fn run_shell(
        &self,
        ctx: &ServiceContext<'_>,
        command: &str,
        extra_env: &[(&str, String)],
        timeout: Option<u64>,
    ) -> Result<std::process::Output> {
        let dir = self.working_dir(ctx);
        debug!("Running: sh -c {} (in {})", command, dir.display());

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&dir)
            .envs(self.env_vars(ctx))
            .envs(extra_env.iter().map(|(k, v)| (*k, v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = cmd.output();
        let output = match timeout {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), output)
                .await
                .map_err(|_| PlatformError::Timeout(format!("{} after {}s", command, secs)))?,
            None => output.await,
        };
        Ok(output?)
    }

    fn ok(ctx: &ServiceContext<'_>, details: VerbDetails) -> CommandResult {
        CommandResult::success(ctx.name(), PlatformType::Process, details)
    }

    async fn live_status(&self, ctx: &ServiceContext<'_>, recorded: Option<&ServiceState>) -> ServiceStatus {
        if ctx.service.kind() == ServiceKind::Filesystem {
            let dirs = self.data_dirs(ctx);
            return if !dirs.is_empty() && dirs.iter().all(|d| d.is_dir()) {
                ServiceStatus::Running
            } else {
                ServiceStatus::Stopped
            };
        }

        if let Some(pid) = recorded.and_then(|s| s.pid) {
            if is_process_alive(pid as i32) {
                return ServiceStatus::Running;
            }
        }
        // started outside semiont but holding our port
        for port in ctx.requirements.ports() {
            if !find_pids_by_port(*port).await.is_empty() {
                return ServiceStatus::Running;
            }
        }
        ServiceStatus::Stopped
    }

    async fn read_logs(&self, service: &str) -> Option<LogSummary> {
        let content = tokio::fs::read_to_string(self.log_path(service)).await.ok()?;
        Some(LogSummary::from_lines(content.lines(), LOG_TAIL))
    }
}

#[async_trait]
impl PlatformStrategy for ProcessPlatform {
    fn platform_type(&self) -> PlatformType {
        PlatformType::Process
    }

    async fn start(&self, ctx: &ServiceContext<'_>, _options: &VerbOptions) -> Result<CommandResult> {
        let service = ctx.service;
        let mut state = ServiceState::new(ctx.name(), PlatformType::Process, &self.environment);
        state.started_at = Some(Utc::now());

        if service.kind() == ServiceKind::Filesystem {
            let dirs = self.data_dirs(ctx);
            for dir in &dirs {
                tokio::fs::create_dir_all(dir).await?;
            }
            state.status = ServiceStatus::Running;
            self.state.save(&state).await?;
            return Ok(Self::ok(
                ctx,
                VerbDetails::Start(StartDetails {
                    start_time: Utc::now(),
                    endpoint: dirs.first().map(|d| format!("file://{}", d.display())),
                    resources: None,
                }),
            ));
        }

        let command = service.command()?;
        for port in ctx.requirements.ports() {
            ensure_port_available(*port).await;
        }

        let log_path = self.log_path(ctx.name());
        if let Some(dir) = log_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;
        let log_err = log.try_clone()?;

        debug!("Running: sh -c {}", command);
        let child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(self.working_dir(ctx))
            .envs(self.env_vars(ctx))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .process_group(0)
            .spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| PlatformError::CommandFailed(format!("{} exited immediately", command)))?;

        let port = service.port();
        let endpoint = port.map(|p| format!("http://localhost:{}", p));
        info!(service = ctx.name(), pid, "Started process");

        state.status = ServiceStatus::Running;
        state.pid = Some(pid);
        state.port = port;
        state.endpoint = endpoint.clone();
        self.state.save(&state).await?;

        Ok(Self::ok(
            ctx,
            VerbDetails::Start(StartDetails {
                start_time: Utc::now(),
                endpoint,
                resources: Some(PlatformResources::Process {
                    pid: Some(pid),
                    port,
                    log_file: Some(log_path.display().to_string()),
                }),
            }),
        ))
    }

    async fn stop(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        let recorded = self.state.load_or_default(&self.environment, ctx.name()).await;
        let mut graceful = true;

        match recorded.as_ref().and_then(|s| s.pid) {
            // negative pid: the whole process group started by `start`
            Some(pid) if is_process_alive(pid as i32) => {
                graceful = kill_process_gracefully(-(pid as i32)).await;
            }
            _ => debug!(service = ctx.name(), "No recorded process"),
        }

        if options.force {
            for port in ctx.requirements.ports() {
                ensure_port_available(*port).await;
            }
        }

        let mut state = recorded
            .unwrap_or_else(|| ServiceState::new(ctx.name(), PlatformType::Process, &self.environment));
        state.status = ServiceStatus::Stopped;
        state.pid = None;
        self.state.save(&state).await?;

        Ok(Self::ok(
            ctx,
            VerbDetails::Stop(StopDetails {
                stop_time: Utc::now(),
                graceful,
            }),
        ))
    }

    async fn check(&self, ctx: &ServiceContext<'_>, _options: &VerbOptions) -> Result<CommandResult> {
        let recorded = self.state.load_or_default(&self.environment, ctx.name()).await;
        let mut status = self.live_status(ctx, recorded.as_ref()).await;

        let health = if status == ServiceStatus::Running {
            ctx.service.check_health().await
        } else {
            None
        };
        if matches!(&health, Some(h) if !h.healthy) {
            status = ServiceStatus::Unhealthy;
        }

        let expected = recorded
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(ServiceStatus::Stopped);
        let state_verified = match status {
            ServiceStatus::Unhealthy => expected == ServiceStatus::Running,
            live => live == expected,
        };

        Ok(Self::ok(
            ctx,
            VerbDetails::Check(CheckDetails {
                status,
                state_verified,
                health,
                resources: recorded.as_ref().map(|s| PlatformResources::Process {
                    pid: s.pid,
                    port: s.port,
                    log_file: Some(self.log_path(ctx.name()).display().to_string()),
                }),
                logs: self.read_logs(ctx.name()).await,
            }),
        ))
    }

    async fn update(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        self.stop(ctx, options).await?;
        let started = self.start(ctx, options).await?;
        if !started.success {
            return Ok(started);
        }

        Ok(Self::ok(
            ctx,
            VerbDetails::Update(UpdateDetails {
                update_time: Utc::now(),
                strategy: "restart".to_string(),
                previous_version: None,
                new_version: options.tag.clone(),
            }),
        ))
    }

    async fn provision(
        &self,
        ctx: &ServiceContext<'_>,
        _options: &VerbOptions,
    ) -> Result<CommandResult> {
        let mut created = Vec::new();
        for dir in self.data_dirs(ctx) {
            tokio::fs::create_dir_all(&dir).await?;
            created.push(dir.display().to_string());
        }
        if let Some(log_dir) = self.log_path(ctx.name()).parent() {
            tokio::fs::create_dir_all(log_dir).await?;
            created.push(log_dir.display().to_string());
        }

        Ok(Self::ok(
            ctx,
            VerbDetails::Provision(ProvisionDetails {
                provision_time: Utc::now(),
                resources: created,
                dependencies: ctx
                    .requirements
                    .dependencies
                    .as_ref()
                    .map(|d| d.services.clone())
                    .unwrap_or_default(),
            }),
        ))
    }

    async fn publish(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        let build = ctx.service.config().build_command.clone().ok_or_else(|| {
            PlatformError::InvalidConfig(format!(
                "Service '{}' has no buildCommand configured",
                ctx.name()
            ))
        })?;

        let output = self.run_shell(ctx, &build, &[], options.timeout).await?;
        if !output.status.success() {
            return Err(PlatformError::CommandFailed(format!(
                "{}: {}",
                build,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(Self::ok(
            ctx,
            VerbDetails::Publish(PublishDetails {
                publish_time: Utc::now(),
                artifacts: vec![self.working_dir(ctx).display().to_string()],
                version: options.tag.clone(),
            }),
        ))
    }

    async fn backup(&self, ctx: &ServiceContext<'_>, _options: &VerbOptions) -> Result<CommandResult> {
        let dirs: Vec<PathBuf> = self.data_dirs(ctx).into_iter().filter(|d| d.is_dir()).collect();
        if dirs.is_empty() {
            return Err(PlatformError::InvalidConfig(format!(
                "Service '{}' has no data directories to back up",
                ctx.name()
            )));
        }

        let backup_id = format!("{}-{}", ctx.name(), Utc::now().format("%Y%m%d%H%M%S"));
        let dest = self.backup_dir().join(format!("{}.tar.gz", backup_id));
        let target = dest.clone();
        let size = tokio::task::spawn_blocking(move || archive::pack_dirs(&dirs, &target))
            .await
            .map_err(|e| PlatformError::CommandFailed(e.to_string()))??;
        info!(service = ctx.name(), backup_id = %backup_id, size, "Backup written");

        Ok(Self::ok(
            ctx,
            VerbDetails::Backup(BackupDetails {
                backup_time: Utc::now(),
                backup_id,
                location: Some(dest.display().to_string()),
                size_bytes: Some(size),
            }),
        ))
    }

    async fn restore(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        let backup_id = match &options.backup_id {
            Some(id) => id.clone(),
            None => latest_backup(&self.backup_dir(), ctx.name())?
                .ok_or_else(|| PlatformError::NotFound(format!("no backups for {}", ctx.name())))?,
        };
        let archive_path = self.backup_dir().join(format!("{}.tar.gz", backup_id));
        if !archive_path.exists() {
            return Err(PlatformError::NotFound(format!("backup {}", backup_id)));
        }

        let dirs = self.data_dirs(ctx);
        tokio::task::spawn_blocking(move || archive::unpack_dirs(&archive_path, &dirs))
            .await
            .map_err(|e| PlatformError::CommandFailed(e.to_string()))??;

        Ok(Self::ok(
            ctx,
            VerbDetails::Restore(RestoreDetails {
                restore_time: Utc::now(),
                backup_id,
            }),
        ))
    }

    async fn test(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        let command = ctx.service.config().test_command.clone().ok_or_else(|| {
            PlatformError::InvalidConfig(format!(
                "Service '{}' has no testCommand configured",
                ctx.name()
            ))
        })?;
        let suite = options.test_suite.clone().unwrap_or_else(|| "all".to_string());

        let output = self
            .run_shell(ctx, &command, &[("SEMIONT_TEST_SUITE", suite.clone())], options.timeout)
            .await?;
        let passed = output.status.success();
        let result = Self::ok(
            ctx,
            VerbDetails::Test(TestDetails {
                test_time: Utc::now(),
                suite,
                passed,
                exit_code: output.status.code(),
                output: Some(String::from_utf8_lossy(&output.stdout).trim().to_string()),
            }),
        );

        Ok(if passed {
            result
        } else {
            result.failed_with(format!("{} failed", command))
        })
    }

    async fn exec(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        let command = options
            .exec_command
            .clone()
            .ok_or_else(|| PlatformError::InvalidConfig("exec needs a command".to_string()))?;

        let output = self.run_shell(ctx, &command, &[], options.timeout).await?;
        let result = Self::ok(
            ctx,
            VerbDetails::Exec(ExecDetails {
                exec_time: Utc::now(),
                command: command.clone(),
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
        );

        Ok(if output.status.success() {
            result
        } else {
            result.failed_with(format!("{} exited with {}", command, output.status))
        })
    }

    async fn manage_secret(
        &self,
        action: SecretAction,
        path: &str,
        value: Option<&str>,
    ) -> Result<SecretOutcome> {
        self.secrets.apply(action, path, value).await
    }
}

/// Whether `id` is `<service>-<YYYYmmddHHMMSS>`
fn is_backup_of(id: &str, service: &str) -> bool {
    id.strip_prefix(service)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|stamp| stamp.len() == 14 && stamp.bytes().all(|b| b.is_ascii_digit()))
}

/// Newest `<service>-<timestamp>.tar.gz` in `dir`, by name
fn latest_backup(dir: &Path, service: &str) -> Result<Option<String>> {
    if !dir.exists() {
        return Ok(None);
    }
    let mut ids: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter_map(|name| name.strip_suffix(".tar.gz").map(str::to_string))
        .filter(|id| is_backup_of(id, service))
        .collect();
    ids.sort();
    Ok(ids.pop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use semiont_core::{EnvironmentConfig, RuntimeFlags, Service, ServiceConfig, ServiceFactory};
    use std::sync::Arc;

    fn service(name: &str, config: ServiceConfig) -> Box<dyn Service> {
        ServiceFactory::create(
            name,
            PlatformType::Process,
            &config,
            Arc::new(EnvironmentConfig {
                name: "local".into(),
                ..Default::default()
            }),
            RuntimeFlags::default(),
            None,
        )
    }

    #[tokio::test]
    async fn test_start_check_stop_process() {
        let dir = tempfile::tempdir().unwrap();
        let platform = ProcessPlatform::new(dir.path(), "local");
        let svc = service(
            "worker",
            ServiceConfig {
                command: Some("echo booted; sleep 30".into()),
                ..Default::default()
            },
        );
        let ctx = ServiceContext::new(svc.as_ref());
        let opts = VerbOptions::default();

        let started = platform.start(&ctx, &opts).await.unwrap();
        assert!(started.success);

        let checked = platform.check(&ctx, &opts).await.unwrap();
        assert_eq!(checked.status(), Some(ServiceStatus::Running));
        assert!(checked.check().unwrap().state_verified);

        let stopped = platform.stop(&ctx, &opts).await.unwrap();
        assert!(stopped.success);

        let checked = platform.check(&ctx, &opts).await.unwrap();
        assert_eq!(checked.status(), Some(ServiceStatus::Stopped));
        assert!(dir.path().join(".semiont/logs/local/worker.log").exists());
    }

    #[tokio::test]
    async fn test_start_without_command_fails() {
        let dir = tempfile::tempdir().unwrap();
        let platform = ProcessPlatform::new(dir.path(), "local");
        let svc = service("worker", ServiceConfig::default());
        let ctx = ServiceContext::new(svc.as_ref());

        let err = platform.start(&ctx, &VerbOptions::default()).await.unwrap_err();
        assert!(err.to_string().contains("Add \"command\" to your service configuration"));
    }

    #[tokio::test]
    async fn test_exec_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let platform = ProcessPlatform::new(dir.path(), "local");
        let svc = service("worker", ServiceConfig::default());
        let ctx = ServiceContext::new(svc.as_ref());
        let opts = VerbOptions {
            exec_command: Some("echo $SEMIONT_SERVICE".into()),
            ..Default::default()
        };

        let result = platform.exec(&ctx, &opts).await.unwrap();
        let Some(VerbDetails::Exec(exec)) = result.details else {
            panic!("expected exec details");
        };
        assert_eq!(exec.stdout.trim(), "worker");
        assert_eq!(exec.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_failing_test_command_is_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        let platform = ProcessPlatform::new(dir.path(), "local");
        let svc = service(
            "worker",
            ServiceConfig {
                test_command: Some("exit 3".into()),
                ..Default::default()
            },
        );
        let ctx = ServiceContext::new(svc.as_ref());

        let result = platform.test(&ctx, &VerbOptions::default()).await.unwrap();
        assert!(!result.success);
        let Some(VerbDetails::Test(test)) = result.details else {
            panic!("expected test details");
        };
        assert_eq!(test.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_filesystem_backup_restore() {
        let dir = tempfile::tempdir().unwrap();
        let platform = ProcessPlatform::new(dir.path(), "local");
        let svc = service(
            "filesystem",
            ServiceConfig {
                path: Some("data/uploads".into()),
                ..Default::default()
            },
        );
        let ctx = ServiceContext::new(svc.as_ref());
        let opts = VerbOptions::default();

        platform.start(&ctx, &opts).await.unwrap();
        let uploads = dir.path().join("data/uploads");
        std::fs::write(uploads.join("doc.txt"), "v1").unwrap();

        let backup = platform.backup(&ctx, &opts).await.unwrap();
        assert!(backup.success);

        std::fs::write(uploads.join("doc.txt"), "v2").unwrap();
        platform.restore(&ctx, &opts).await.unwrap();
        assert_eq!(std::fs::read_to_string(uploads.join("doc.txt")).unwrap(), "v1");
    }

    #[test]
    fn test_latest_backup_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "database-20250101000000.tar.gz",
            "database-20250301000000.tar.gz",
            "filesystem-20251201000000.tar.gz",
        ] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        assert_eq!(
            latest_backup(dir.path(), "database").unwrap().as_deref(),
            Some("database-20250301000000")
        );
        assert!(latest_backup(dir.path(), "backend").unwrap().is_none());
    }

    #[test]
    fn test_latest_backup_ignores_longer_service_names() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "backend-20250101000000.tar.gz",
            "backend-worker-20240101000000.tar.gz",
            "backend-20250101000000-copy.tar.gz",
        ] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        assert_eq!(
            latest_backup(dir.path(), "backend").unwrap().as_deref(),
            Some("backend-20250101000000")
        );
        assert_eq!(
            latest_backup(dir.path(), "backend-worker").unwrap().as_deref(),
            Some("backend-worker-20240101000000")
        );
    }
}
