//! Container platform over the docker / podman CLI

use crate::error::ContainerError;
use crate::parse::{self, InspectState};
use crate::runtime::{ContainerRuntime, RunSpec};
use async_trait::async_trait;
use chrono::Utc;
use semiont_core::{PlatformType, ServiceContext, ServiceKind};
use semiont_platform::result::{
    BackupDetails, ExecDetails, ProvisionDetails, PublishDetails, RestoreDetails, StartDetails,
    StopDetails, TestDetails, UpdateDetails,
};
use semiont_platform::{
    CheckDetails, CommandResult, LocalSecretStore, PlatformError, PlatformResources,
    PlatformStrategy, Result, SecretAction, SecretOutcome, ServiceState, ServiceStatus,
    StateManager, VerbDetails, VerbOptions,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const BACKUP_IMAGE: &str = "alpine:3";
const STOP_TIMEOUT_SECS: u64 = 10;
const LOG_TAIL: usize = 10;

pub fn container_name(service: &str, environment: &str) -> String {
    format!("semiont-{}-{}", service, environment)
}

/// What `inspect` told us about a container
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Observed {
    Missing,
    Unparseable(String),
    State(InspectState),
}

pub(crate) async fn observe(runtime: &ContainerRuntime, ctx: &ServiceContext<'_>) -> Result<Observed> {
    let name = container_name(ctx.name(), ctx.environment_name());
    match runtime.inspect(&name).await {
        Ok(None) => Ok(Observed::Missing),
        Ok(Some(state)) => Ok(Observed::State(state)),
        Err(ContainerError::Parse(e)) => {
            debug!("Could not parse inspect output for {}: {}", name, e);
            Ok(Observed::Unparseable(e.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

pub struct ContainerPlatform {
    runtime: Arc<ContainerRuntime>,
    project_root: PathBuf,
    environment: String,
    state: StateManager,
    secrets: LocalSecretStore,
}

impl ContainerPlatform {
    pub fn new(runtime: Arc<ContainerRuntime>, project_root: &Path, environment: &str) -> Self {
        Self {
            runtime,
            project_root: project_root.to_path_buf(),
            environment: environment.to_string(),
            state: StateManager::new(project_root),
            secrets: LocalSecretStore::new(project_root, environment),
        }
    }

    fn name(&self, ctx: &ServiceContext<'_>) -> String {
        container_name(ctx.name(), &self.environment)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    fn backup_dir(&self) -> PathBuf {
        self.project_root
            .join(".semiont/backups")
            .join(&self.environment)
    }

    /// `(volume, mount path)` for each named persistent volume
    fn volumes(&self, ctx: &ServiceContext<'_>) -> Vec<(String, String)> {
        ctx.requirements
            .persistent_storage()
            .filter_map(|s| Some((s.volume_name.clone()?, s.mount_path.clone()?)))
            .collect()
    }

    fn primary_volume(&self, ctx: &ServiceContext<'_>) -> Result<String> {
        self.volumes(ctx)
            .into_iter()
            .next()
            .map(|(volume, _)| volume)
            .ok_or_else(|| {
                PlatformError::InvalidConfig(format!(
                    "Service '{}' has no persistent volume",
                    ctx.name()
                ))
            })
    }

    async fn ensure_volumes(&self, ctx: &ServiceContext<'_>) -> Result<Vec<String>> {
        let mut created = Vec::new();
        for (volume, _) in self.volumes(ctx) {
            self.runtime.volume_create(&volume).await?;
            created.push(format!("volume:{}", volume));
        }
        Ok(created)
    }

    fn run_spec(&self, ctx: &ServiceContext<'_>) -> RunSpec {
        let service = ctx.service;
        let reqs = &ctx.requirements;

        let mut env: BTreeMap<String, String> = reqs
            .environment
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect();
        env.extend(service.environment_variables());

        let mounts = self.volumes(ctx);

        let mut labels: BTreeMap<String, String> = reqs
            .labels
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect();
        labels.insert("semiont.service".to_string(), ctx.name().to_string());
        labels.insert("semiont.environment".to_string(), self.environment.clone());

        RunSpec {
            name: self.name(ctx),
            image: service.image(),
            ports: reqs.ports().to_vec(),
            env,
            mounts,
            command: service.config().command.clone(),
            cpus: reqs.resources.as_ref().and_then(|r| r.cpu.clone()),
            memory: reqs.resources.as_ref().and_then(|r| r.memory.clone()),
            labels,
        }
    }

    async fn remove_container(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<bool> {
        let name = self.name(ctx);
        if self.runtime.inspect(&name).await.ok().flatten().is_none() {
            debug!("Container {} does not exist", name);
            return Ok(true);
        }
        let graceful = if options.force {
            false
        } else {
            let timeout = options.timeout.unwrap_or(STOP_TIMEOUT_SECS);
            match self.runtime.stop(&name, timeout).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Graceful stop of {} failed: {}", name, e);
                    false
                }
            }
        };
        self.runtime.remove(&name, !graceful).await?;
        Ok(graceful)
    }

    fn ok(ctx: &ServiceContext<'_>, details: VerbDetails) -> CommandResult {
        CommandResult::success(ctx.name(), PlatformType::Container, details)
    }
}

#[async_trait]
impl PlatformStrategy for ContainerPlatform {
    fn platform_type(&self) -> PlatformType {
        PlatformType::Container
    }

    async fn start(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        let volumes = self.ensure_volumes(ctx).await?;
        let mut state = ServiceState::new(ctx.name(), PlatformType::Container, &self.environment);
        state.started_at = Some(Utc::now());

        // storage only: nothing to run
        if ctx.service.kind() == ServiceKind::Filesystem && ctx.service.config().image.is_none() {
            state.status = ServiceStatus::Running;
            self.state.save(&state).await?;
            return Ok(Self::ok(
                ctx,
                VerbDetails::Start(StartDetails {
                    start_time: Utc::now(),
                    endpoint: None,
                    resources: None,
                }),
            )
            .with_metadata("volumes", volumes));
        }

        self.remove_container(ctx, &VerbOptions { force: true, ..options.clone() })
            .await?;
        let spec = self.run_spec(ctx);
        let id = self.runtime.run(&spec).await?;
        info!(container = %spec.name, id = %id, "Started container");

        let port = ctx.service.port();
        let endpoint = port.map(|p| format!("http://localhost:{}", p));
        state.status = ServiceStatus::Running;
        state.container_id = Some(id.clone());
        state.port = port;
        state.endpoint = endpoint.clone();
        self.state.save(&state).await?;

        Ok(Self::ok(
            ctx,
            VerbDetails::Start(StartDetails {
                start_time: Utc::now(),
                endpoint,
                resources: Some(PlatformResources::Container {
                    container_name: spec.name.clone(),
                    container_id: Some(id),
                    image: spec.image.clone(),
                    ports: spec.ports.iter().map(|p| (*p, *p)).collect(),
                }),
            }),
        ))
    }

    async fn stop(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        let graceful = self.remove_container(ctx, options).await?;

        let mut state = self
            .state
            .load_or_default(&self.environment, ctx.name())
            .await
            .unwrap_or_else(|| ServiceState::new(ctx.name(), PlatformType::Container, &self.environment));
        state.status = ServiceStatus::Stopped;
        state.container_id = None;
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
        let name = self.name(ctx);
        let observed = observe(&self.runtime, ctx).await?;
        let recorded = self.state.load_or_default(&self.environment, ctx.name()).await;
        let expected = recorded.map(|s| s.status).unwrap_or(ServiceStatus::Stopped);
        let mut warnings = Vec::new();

        let (status, resources, logs, health) = match &observed {
            Observed::Missing => (ServiceStatus::Stopped, None, None, None),
            Observed::Unparseable(reason) => {
                warnings.push(reason.clone());
                (ServiceStatus::Unknown, None, None, None)
            }
            Observed::State(state) => {
                let ports = if state.is_running() {
                    self.runtime.ports(&name).await.unwrap_or_else(|e| {
                        warnings.push(e.to_string());
                        BTreeMap::new()
                    })
                } else {
                    BTreeMap::new()
                };
                let logs = match self.runtime.logs(&name, LOG_TAIL).await {
                    Ok(out) => Some(parse::parse_logs(&out, LOG_TAIL)),
                    Err(_) => None,
                };
                let health = if state.is_running() {
                    ctx.service.check_health().await
                } else {
                    None
                };
                let status = if !state.is_running() {
                    ServiceStatus::Stopped
                } else if state.is_unhealthy() || matches!(&health, Some(h) if !h.healthy) {
                    ServiceStatus::Unhealthy
                } else {
                    ServiceStatus::Running
                };
                let resources = PlatformResources::Container {
                    container_name: name.clone(),
                    container_id: Some(state.id.clone()),
                    image: ctx.service.image(),
                    ports,
                };
                (status, Some(resources), logs, health)
            }
        };

        let state_verified = match status {
            ServiceStatus::Unknown => false,
            ServiceStatus::Unhealthy => expected == ServiceStatus::Running,
            live => live == expected,
        };

        let mut result = Self::ok(
            ctx,
            VerbDetails::Check(CheckDetails {
                status,
                state_verified,
                health,
                resources,
                logs,
            }),
        );
        for warning in warnings {
            result = result.with_warning(warning);
        }
        Ok(result)
    }

    async fn update(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        let name = self.name(ctx);
        let previous = self
            .runtime
            .inspect(&name)
            .await
            .ok()
            .flatten()
            .map(|s| s.id);

        let image = ctx.service.image();
        if let Err(e) = self.runtime.pull(&image).await {
            // locally built images have nothing to pull
            debug!("Pull of {} skipped: {}", image, e);
        }

        let started = self.start(ctx, options).await?;
        let current = match &started.details {
            Some(VerbDetails::Start(s)) => match &s.resources {
                Some(PlatformResources::Container { container_id, .. }) => container_id.clone(),
                _ => None,
            },
            _ => None,
        };

        Ok(Self::ok(
            ctx,
            VerbDetails::Update(UpdateDetails {
                update_time: Utc::now(),
                strategy: "recreate".to_string(),
                previous_version: previous,
                new_version: current,
            }),
        ))
    }

    async fn provision(
        &self,
        ctx: &ServiceContext<'_>,
        _options: &VerbOptions,
    ) -> Result<CommandResult> {
        let mut resources = self.ensure_volumes(ctx).await?;

        let prebuilt = ctx
            .requirements
            .build
            .as_ref()
            .map(|b| b.prebuilt)
            .unwrap_or(false);
        if prebuilt {
            let image = ctx.service.image();
            self.runtime.pull(&image).await?;
            resources.push(format!("image:{}", image));
        }

        Ok(Self::ok(
            ctx,
            VerbDetails::Provision(ProvisionDetails {
                provision_time: Utc::now(),
                resources,
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
        let build = ctx
            .requirements
            .build
            .as_ref()
            .filter(|b| !b.prebuilt)
            .ok_or_else(|| {
                PlatformError::InvalidConfig(format!(
                    "Service '{}' has no dockerfile or buildContext to publish",
                    ctx.name()
                ))
            })?;

        let tag = options.tag.clone().unwrap_or_else(|| "latest".to_string());
        let image = ctx.service.image();
        let repo = image.rsplit_once(':').map(|(r, _)| r).unwrap_or(&image);
        let reference = format!("{}:{}", repo, tag);

        let context = build
            .build_context
            .clone()
            .or_else(|| ctx.service.config().path.clone())
            .unwrap_or_else(|| ".".to_string());
        let context = self.resolve(&context).display().to_string();
        let dockerfile = build
            .dockerfile
            .as_deref()
            .map(|d| self.resolve(d).display().to_string());

        self.runtime
            .build(&reference, dockerfile.as_deref(), &context)
            .await?;
        let mut result = Self::ok(
            ctx,
            VerbDetails::Publish(PublishDetails {
                publish_time: Utc::now(),
                artifacts: vec![reference.clone()],
                version: Some(tag),
            }),
        );

        // only images with a registry host can be pushed
        if repo.contains('/') {
            self.runtime.push(&reference).await?;
        } else {
            result = result.with_warning(format!("{} has no registry; built locally only", reference));
        }
        Ok(result)
    }

    async fn backup(&self, ctx: &ServiceContext<'_>, _options: &VerbOptions) -> Result<CommandResult> {
        let volume = self.primary_volume(ctx)?;
        let dir = self.backup_dir();
        tokio::fs::create_dir_all(&dir).await?;

        let backup_id = format!("{}-{}", ctx.name(), Utc::now().format("%Y%m%d%H%M%S"));
        let mounts = vec![
            (volume, "/data".to_string()),
            (dir.display().to_string(), "/backup".to_string()),
        ];
        self.runtime
            .run_oneshot(
                BACKUP_IMAGE,
                &mounts,
                &format!("tar czf /backup/{}.tar.gz -C /data .", backup_id),
            )
            .await?;

        let location = dir.join(format!("{}.tar.gz", backup_id));
        let size = tokio::fs::metadata(&location).await.ok().map(|m| m.len());
        Ok(Self::ok(
            ctx,
            VerbDetails::Backup(BackupDetails {
                backup_time: Utc::now(),
                backup_id,
                location: Some(location.display().to_string()),
                size_bytes: size,
            }),
        ))
    }

    async fn restore(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        let volume = self.primary_volume(ctx)?;
        let dir = self.backup_dir();
        let backup_id = options
            .backup_id
            .clone()
            .ok_or_else(|| PlatformError::InvalidConfig("restore needs --backup-id".to_string()))?;
        if !dir.join(format!("{}.tar.gz", backup_id)).exists() {
            return Err(PlatformError::NotFound(format!("backup {}", backup_id)));
        }

        let mounts = vec![
            (volume, "/data".to_string()),
            (dir.display().to_string(), "/backup".to_string()),
        ];
        self.runtime
            .run_oneshot(
                BACKUP_IMAGE,
                &mounts,
                &format!(
                    "rm -rf /data/* /data/..?* /data/.[!.]* ; tar xzf /backup/{}.tar.gz -C /data",
                    backup_id
                ),
            )
            .await?;

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
        let out = self
            .runtime
            .exec(&self.name(ctx), &format!("SEMIONT_TEST_SUITE={} {}", suite, command))
            .await?;

        let result = Self::ok(
            ctx,
            VerbDetails::Test(TestDetails {
                test_time: Utc::now(),
                suite,
                passed: out.success,
                exit_code: out.code,
                output: Some(out.stdout.trim().to_string()),
            }),
        );
        Ok(if out.success {
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
        let out = self.runtime.exec(&self.name(ctx), &command).await?;

        let result = Self::ok(
            ctx,
            VerbDetails::Exec(ExecDetails {
                exec_time: Utc::now(),
                command: command.clone(),
                exit_code: out.code,
                stdout: out.stdout,
                stderr: out.stderr,
            }),
        );
        Ok(if out.success {
            result
        } else {
            result.failed_with(format!("{} exited with {:?}", command, out.code))
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

#[cfg(test)]
mod tests {
    use super::*;
    use semiont_core::{EnvironmentConfig, RuntimeFlags, Service, ServiceConfig, ServiceFactory};

    fn service(name: &str, config: ServiceConfig) -> Box<dyn Service> {
        ServiceFactory::create(
            name,
            PlatformType::Container,
            &config,
            Arc::new(EnvironmentConfig {
                name: "local".into(),
                ..Default::default()
            }),
            RuntimeFlags::default(),
            None,
        )
    }

    fn platform(root: &Path) -> ContainerPlatform {
        ContainerPlatform::new(Arc::new(ContainerRuntime::new("docker")), root, "local")
    }

    #[test]
    fn test_container_name() {
        assert_eq!(container_name("backend", "staging"), "semiont-backend-staging");
    }

    #[test]
    fn test_run_spec_for_database() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(
            "database",
            ServiceConfig {
                service_type: Some("postgres".into()),
                environment: [("POSTGRES_PASSWORD".to_string(), "pw".to_string())].into(),
                ..Default::default()
            },
        );
        let ctx = ServiceContext::new(svc.as_ref());
        let spec = platform(dir.path()).run_spec(&ctx);

        assert_eq!(spec.name, "semiont-database-local");
        assert_eq!(spec.image, "postgres:15-alpine");
        assert_eq!(spec.ports, vec![5432]);
        assert_eq!(spec.env["POSTGRES_PASSWORD"], "pw");
        assert_eq!(spec.env["SEMIONT_ENV"], "local");
        assert_eq!(
            spec.mounts,
            vec![(
                "semiont-database-local-data".to_string(),
                "/var/lib/postgresql/data".to_string()
            )]
        );
        assert_eq!(spec.labels["semiont.service"], "database");
        assert!(spec.command.is_none());
    }

    #[test]
    fn test_filesystem_volume_mount() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(
            "filesystem",
            ServiceConfig {
                mount_path: Some("/srv/uploads".into()),
                ..Default::default()
            },
        );
        let ctx = ServiceContext::new(svc.as_ref());
        let platform = platform(dir.path());
        assert_eq!(
            platform.run_spec(&ctx).mounts,
            vec![(
                "semiont-filesystem-local".to_string(),
                "/srv/uploads".to_string()
            )]
        );
        assert_eq!(
            platform.primary_volume(&ctx).unwrap(),
            "semiont-filesystem-local"
        );
    }

    #[test]
    fn test_backup_needs_volume() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service("backend", ServiceConfig::default());
        let ctx = ServiceContext::new(svc.as_ref());
        assert!(platform(dir.path()).primary_volume(&ctx).is_err());
    }
}
