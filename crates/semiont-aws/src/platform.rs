//! AWS platform: ECS services, RDS databases, EFS file systems

use crate::cli::{self, profile_args};
use crate::clients::{AwsClients, ClientCache};
use crate::credentials::check_credentials;
use crate::discovery::{
    CLUSTER_NAME, CloudFormationSource, DB_INSTANCE_ID, DiscoveredResources, Discovery,
    FILE_SYSTEM_ID, LOAD_BALANCER_DNS, StackSource, service_key,
};
use crate::error::AwsError;
use async_trait::async_trait;
use aws_sdk_secretsmanager::error::ProvideErrorMetadata;
use chrono::{DateTime, Utc};
use semiont_core::{EnvironmentConfig, PlatformType, ServiceContext, ServiceKind, StackNames, Verb};
use semiont_platform::result::{
    BackupDetails, ExecDetails, ProvisionDetails, PublishDetails, RestoreDetails, StartDetails,
    StopDetails, UpdateDetails,
};
use semiont_platform::{
    CheckDetails, CommandResult, PlatformError, PlatformResources, PlatformStrategy, Result,
    SecretAction, SecretOutcome, ServiceState, ServiceStatus, StateManager, VerbDetails,
    VerbOptions,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SECRET_RECOVERY_DAYS: i64 = 7;

/// Which AWS service realises a Semiont service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwsTarget {
    Ecs,
    Rds,
    Efs,
}

impl AwsTarget {
    pub fn for_kind(kind: ServiceKind) -> Self {
        match kind {
            ServiceKind::Database => AwsTarget::Rds,
            ServiceKind::Filesystem => AwsTarget::Efs,
            _ => AwsTarget::Ecs,
        }
    }
}

/// Stack owning a service: data stack for storage, app stack otherwise
pub fn stack_for(stacks: &StackNames, target: AwsTarget) -> Option<&str> {
    match target {
        AwsTarget::Rds | AwsTarget::Efs => stacks.data.as_deref(),
        AwsTarget::Ecs => stacks.app.as_deref(),
    }
}

pub fn ecs_status(desired: i32, running: i32) -> ServiceStatus {
    match (desired, running) {
        (0, 0) => ServiceStatus::Stopped,
        (_, 0) => ServiceStatus::Unhealthy,
        _ => ServiceStatus::Running,
    }
}

pub fn rds_status(status: &str) -> ServiceStatus {
    match status {
        "available" | "backing-up" | "modifying" | "upgrading" | "configuring-enhanced-monitoring" => {
            ServiceStatus::Running
        }
        "stopped" | "stopping" => ServiceStatus::Stopped,
        "failed" | "storage-full" | "inaccessible-encryption-credentials"
        | "incompatible-network" | "incompatible-parameters" | "incompatible-restore" => {
            ServiceStatus::Unhealthy
        }
        _ => ServiceStatus::Unknown,
    }
}

pub fn snapshot_id(db_instance: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}", db_instance, at.format("%Y%m%d%H%M%S"))
}

pub fn ecr_registry(account_id: &str, region: &str) -> String {
    format!("{}.dkr.ecr.{}.amazonaws.com", account_id, region)
}

/// Secrets Manager id for a path within an environment
pub fn secret_id(environment: &str, path: &str) -> String {
    format!("semiont/{}/{}", environment, path.trim_start_matches('/'))
}

pub struct AwsPlatform {
    project_root: PathBuf,
    environment: String,
    region: String,
    account_id: Option<String>,
    profile: Option<String>,
    stacks: StackNames,
    clients: ClientCache,
    state: StateManager,
    /// Stack reader override; CloudFormation in the configured region otherwise
    source: Option<Arc<dyn StackSource>>,
}

impl AwsPlatform {
    pub fn new(project_root: &Path, environment: &EnvironmentConfig) -> crate::Result<Self> {
        let aws = environment
            .aws
            .as_ref()
            .filter(|a| !a.region.is_empty())
            .ok_or_else(|| AwsError::MissingRegion(environment.name.clone()))?;

        Ok(Self {
            project_root: project_root.to_path_buf(),
            environment: environment.name.clone(),
            region: aws.region.clone(),
            account_id: aws.account_id.clone(),
            profile: aws.profile.clone(),
            stacks: aws.stacks.clone(),
            clients: ClientCache::new(aws.profile.clone()),
            state: StateManager::new(project_root),
            source: None,
        })
    }

    /// Read stacks from `source` instead of CloudFormation
    pub fn with_source(mut self, source: Arc<dyn StackSource>) -> Self {
        self.source = Some(source);
        self
    }

    async fn clients(&self) -> Arc<AwsClients> {
        self.clients.for_region(&self.region).await
    }

    async fn stack_source(&self) -> Arc<dyn StackSource> {
        match &self.source {
            Some(source) => source.clone(),
            None => {
                let clients = self.clients().await;
                Arc::new(CloudFormationSource::new(clients.cloudformation.clone()))
            }
        }
    }

    /// Discovered resources, from the state-file cache while it is fresh
    ///
    /// Only `--force-discovery` bypasses the cache.
    async fn discovered(&self, ctx: &ServiceContext<'_>) -> DiscoveredResources {
        let discovery = Discovery::new(
            self.stack_source().await,
            self.state.clone(),
            &self.environment,
        );
        let stacks: Vec<String> = self.stacks.iter().map(str::to_string).collect();
        discovery
            .resources(ctx.name(), &stacks, ctx.flags().force_discovery)
            .await
    }

    fn require(
        resources: &DiscoveredResources,
        key: &str,
        ctx: &ServiceContext<'_>,
    ) -> crate::Result<String> {
        resources
            .get(key)
            .cloned()
            .ok_or_else(|| AwsError::NotDiscovered {
                service: ctx.name().to_string(),
                resource: key.to_string(),
            })
    }

    fn ecs_target(
        resources: &DiscoveredResources,
        ctx: &ServiceContext<'_>,
    ) -> crate::Result<(String, String)> {
        let cluster = Self::require(resources, CLUSTER_NAME, ctx)?;
        let service = Self::require(resources, &service_key(ctx.name()), ctx)?;
        Ok((cluster, service))
    }

    async fn db_instance(&self, ctx: &ServiceContext<'_>) -> crate::Result<String> {
        let resources = self.discovered(ctx).await;
        Self::require(&resources, DB_INSTANCE_ID, ctx)
    }

    fn target(ctx: &ServiceContext<'_>) -> AwsTarget {
        AwsTarget::for_kind(ctx.service.kind())
    }

    fn ok(ctx: &ServiceContext<'_>, details: VerbDetails) -> CommandResult {
        CommandResult::success(ctx.name(), PlatformType::Aws, details)
    }

    fn unsupported(verb: Verb) -> PlatformError {
        PlatformError::Unsupported {
            platform: PlatformType::Aws,
            verb,
        }
    }

    async fn record_status(&self, ctx: &ServiceContext<'_>, status: ServiceStatus) -> Result<()> {
        let mut state = self
            .state
            .load_or_default(&self.environment, ctx.name())
            .await
            .unwrap_or_else(|| ServiceState::new(ctx.name(), PlatformType::Aws, &self.environment));
        state.status = status;
        if status == ServiceStatus::Running {
            state.started_at = Some(Utc::now());
        }
        self.state.save(&state).await
    }

    /// `(status, endpoint)` of an RDS instance, `None` when it does not exist
    async fn describe_db(
        &self,
        clients: &AwsClients,
        id: &str,
    ) -> crate::Result<Option<(String, Option<String>)>> {
        debug!("Running: rds describe-db-instances --db-instance-identifier {}", id);
        let response = match clients
            .rds
            .describe_db_instances()
            .db_instance_identifier(id)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.code() == Some("DBInstanceNotFound") => return Ok(None),
            Err(e) => return Err(AwsError::sdk("rds describe-db-instances", e)),
        };
        Ok(response.db_instances().first().map(|db| {
            let status = db.db_instance_status().unwrap_or("unknown").to_string();
            let endpoint = db.endpoint().and_then(|ep| {
                let address = ep.address()?;
                Some(match ep.port() {
                    Some(port) => format!("{}:{}", address, port),
                    None => address.to_string(),
                })
            });
            (status, endpoint)
        }))
    }

    fn public_endpoint(ctx: &ServiceContext<'_>, resources: &DiscoveredResources) -> Option<String> {
        ctx.service
            .config()
            .public_url
            .clone()
            .or_else(|| resources.get(LOAD_BALANCER_DNS).map(|dns| format!("https://{}", dns)))
    }

    async fn set_desired_count(
        &self,
        ctx: &ServiceContext<'_>,
        resources: &DiscoveredResources,
        desired: i32,
        force_deployment: bool,
    ) -> crate::Result<Option<String>> {
        let clients = self.clients().await;
        let (cluster, service) = Self::ecs_target(resources, ctx)?;
        debug!(
            "Running: ecs update-service --cluster {} --service {} --desired-count {}",
            cluster, service, desired
        );
        let mut request = clients
            .ecs
            .update_service()
            .cluster(&cluster)
            .service(&service)
            .force_new_deployment(force_deployment);
        if desired >= 0 {
            request = request.desired_count(desired);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AwsError::sdk("ecs update-service", e))?;
        Ok(response
            .service()
            .and_then(|s| s.task_definition())
            .map(str::to_string))
    }

    fn desired_replicas(ctx: &ServiceContext<'_>) -> i32 {
        ctx.requirements
            .resources
            .as_ref()
            .and_then(|r| r.replicas)
            .map(|r| r as i32)
            .unwrap_or(1)
    }

    async fn ensure_credentials(&self) -> crate::Result<()> {
        let check = check_credentials(self.profile.as_deref()).await;
        if check.valid {
            debug!("{}", check.message);
            Ok(())
        } else {
            Err(AwsError::Credentials(check.message))
        }
    }
}

#[async_trait]
impl PlatformStrategy for AwsPlatform {
    fn platform_type(&self) -> PlatformType {
        PlatformType::Aws
    }

    async fn start(&self, ctx: &ServiceContext<'_>, _options: &VerbOptions) -> Result<CommandResult> {
        let resources = self.discovered(ctx).await;
        let endpoint = match Self::target(ctx) {
            AwsTarget::Ecs => {
                self.set_desired_count(ctx, &resources, Self::desired_replicas(ctx), false)
                    .await?;
                Self::public_endpoint(ctx, &resources)
            }
            AwsTarget::Rds => {
                let clients = self.clients().await;
                let id = Self::require(&resources, DB_INSTANCE_ID, ctx)?;
                match self.describe_db(&clients, &id).await? {
                    Some((status, endpoint)) if status == "stopped" => {
                        debug!("Running: rds start-db-instance --db-instance-identifier {}", id);
                        clients
                            .rds
                            .start_db_instance()
                            .db_instance_identifier(&id)
                            .send()
                            .await
                            .map_err(|e| AwsError::sdk("rds start-db-instance", e))?;
                        endpoint
                    }
                    Some((status, endpoint)) => {
                        debug!("RDS instance {} is {}, not starting", id, status);
                        endpoint
                    }
                    None => {
                        return Err(AwsError::NotDiscovered {
                            service: ctx.name().to_string(),
                            resource: id,
                        }
                        .into());
                    }
                }
            }
            AwsTarget::Efs => {
                Self::require(&resources, FILE_SYSTEM_ID, ctx)?;
                None
            }
        };
        self.record_status(ctx, ServiceStatus::Running).await?;
        info!(service = ctx.name(), "Started on AWS");

        Ok(Self::ok(
            ctx,
            VerbDetails::Start(StartDetails {
                start_time: Utc::now(),
                endpoint,
                resources: Some(PlatformResources::Aws { ids: resources }),
            }),
        ))
    }

    async fn stop(&self, ctx: &ServiceContext<'_>, _options: &VerbOptions) -> Result<CommandResult> {
        let mut warning = None;
        match Self::target(ctx) {
            AwsTarget::Ecs => {
                let resources = self.discovered(ctx).await;
                self.set_desired_count(ctx, &resources, 0, false).await?;
            }
            AwsTarget::Rds => {
                let clients = self.clients().await;
                let id = self.db_instance(ctx).await?;
                match self.describe_db(&clients, &id).await? {
                    Some((status, _)) if status == "available" => {
                        debug!("Running: rds stop-db-instance --db-instance-identifier {}", id);
                        clients
                            .rds
                            .stop_db_instance()
                            .db_instance_identifier(&id)
                            .send()
                            .await
                            .map_err(|e| AwsError::sdk("rds stop-db-instance", e))?;
                    }
                    Some((status, _)) => {
                        warning = Some(format!("RDS instance {} is {}; left as is", id, status));
                    }
                    None => warning = Some(format!("RDS instance {} does not exist", id)),
                }
            }
            AwsTarget::Efs => {
                warning = Some("EFS file systems have no stopped state".to_string());
            }
        }
        self.record_status(ctx, ServiceStatus::Stopped).await?;

        let result = Self::ok(
            ctx,
            VerbDetails::Stop(StopDetails {
                stop_time: Utc::now(),
                graceful: true,
            }),
        );
        Ok(match warning {
            Some(w) => result.with_warning(w),
            None => result,
        })
    }

    async fn check(&self, ctx: &ServiceContext<'_>, _options: &VerbOptions) -> Result<CommandResult> {
        let resources = self.discovered(ctx).await;
        let mut warnings = Vec::new();

        let status = match Self::target(ctx) {
            AwsTarget::Ecs => {
                match (
                    resources.get(CLUSTER_NAME),
                    resources.get(&service_key(ctx.name())),
                ) {
                    (Some(cluster), Some(service)) => {
                        debug!(
                            "Running: ecs describe-services --cluster {} --services {}",
                            cluster, service
                        );
                        let clients = self.clients().await;
                        let response = clients
                            .ecs
                            .describe_services()
                            .cluster(cluster)
                            .services(service)
                            .send()
                            .await
                            .map_err(|e| AwsError::sdk("ecs describe-services", e))?;
                        match response.services().first() {
                            Some(s) => ecs_status(s.desired_count(), s.running_count()),
                            None => ServiceStatus::Stopped,
                        }
                    }
                    _ => {
                        warnings.push(format!("ECS service for {} not discovered", ctx.name()));
                        ServiceStatus::Unknown
                    }
                }
            }
            AwsTarget::Rds => match resources.get(DB_INSTANCE_ID) {
                Some(id) => match self.describe_db(&*self.clients().await, id).await? {
                    Some((status, _)) => rds_status(&status),
                    None => ServiceStatus::Stopped,
                },
                None => {
                    warnings.push("RDS instance not discovered".to_string());
                    ServiceStatus::Unknown
                }
            },
            AwsTarget::Efs => {
                if resources.contains_key(FILE_SYSTEM_ID) {
                    ServiceStatus::Running
                } else {
                    ServiceStatus::Unknown
                }
            }
        };

        let expected = self
            .state
            .load_or_default(&self.environment, ctx.name())
            .await
            .map(|s| s.status);
        let state_verified = match (status, expected) {
            (ServiceStatus::Unknown, _) | (_, None) => false,
            (live, Some(expected)) => live == expected,
        };

        let mut result = Self::ok(
            ctx,
            VerbDetails::Check(CheckDetails {
                status,
                state_verified,
                health: None,
                resources: Some(PlatformResources::Aws { ids: resources }),
                logs: None,
            }),
        );
        for warning in warnings {
            result = result.with_warning(warning);
        }
        Ok(result)
    }

    async fn update(&self, ctx: &ServiceContext<'_>, _options: &VerbOptions) -> Result<CommandResult> {
        if Self::target(ctx) != AwsTarget::Ecs {
            return Err(Self::unsupported(Verb::Update));
        }
        let clients = self.clients().await;
        let resources = self.discovered(ctx).await;
        let (cluster, service) = Self::ecs_target(&resources, ctx)?;
        let previous = clients
            .ecs
            .describe_services()
            .cluster(&cluster)
            .services(&service)
            .send()
            .await
            .ok()
            .and_then(|r| {
                r.services()
                    .first()
                    .and_then(|s| s.task_definition())
                    .map(str::to_string)
            });

        // -1 leaves the desired count alone
        let current = self.set_desired_count(ctx, &resources, -1, true).await?;
        info!(service = ctx.name(), "Forced new ECS deployment");

        Ok(Self::ok(
            ctx,
            VerbDetails::Update(UpdateDetails {
                update_time: Utc::now(),
                strategy: "rolling".to_string(),
                previous_version: previous,
                new_version: current,
            }),
        ))
    }

    async fn provision(
        &self,
        ctx: &ServiceContext<'_>,
        options: &VerbOptions,
    ) -> Result<CommandResult> {
        let stack = options
            .target
            .as_deref()
            .or_else(|| stack_for(&self.stacks, Self::target(ctx)))
            .ok_or_else(|| AwsError::MissingStack(ctx.name().to_string()))?;
        self.ensure_credentials().await?;

        let mut args = vec![
            "deploy",
            stack,
            "--require-approval",
            "never",
            "--context",
        ];
        let env_context = format!("environment={}", self.environment);
        args.push(&env_context);
        args.extend(profile_args(self.profile.as_deref()));
        info!(service = ctx.name(), stack, "Deploying CloudFormation stack");
        cli::run("cdk", &args, Some(&self.project_root)).await?;

        let resources = self.discovered(ctx).await;
        Ok(Self::ok(
            ctx,
            VerbDetails::Provision(ProvisionDetails {
                provision_time: Utc::now(),
                resources: resources
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect(),
                dependencies: ctx
                    .requirements
                    .dependencies
                    .as_ref()
                    .map(|d| d.services.clone())
                    .unwrap_or_default(),
            }),
        )
        .with_metadata("stack", stack))
    }

    async fn publish(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        if Self::target(ctx) != AwsTarget::Ecs {
            return Err(Self::unsupported(Verb::Publish));
        }
        let account = self.account_id.as_deref().ok_or_else(|| {
            PlatformError::InvalidConfig("aws.accountId is required to publish to ECR".to_string())
        })?;
        self.ensure_credentials().await?;

        let registry = ecr_registry(account, &self.region);
        let tag = options.tag.clone().unwrap_or_else(|| "latest".to_string());
        let reference = format!("{}/semiont-{}:{}", registry, ctx.name(), tag);

        let profile = self
            .profile
            .as_ref()
            .map(|p| format!(" --profile {}", p))
            .unwrap_or_default();
        let login = format!(
            "aws ecr get-login-password --region {}{} | docker login --username AWS --password-stdin {}",
            self.region, profile, registry
        );
        cli::run("sh", &["-c", &login], None).await?;

        let config = ctx.service.config();
        let context = config
            .build_context
            .clone()
            .or_else(|| config.path.clone())
            .unwrap_or_else(|| ".".to_string());
        let mut args = vec!["build", "-t", reference.as_str()];
        if let Some(dockerfile) = config.dockerfile.as_deref() {
            args.extend(["-f", dockerfile]);
        }
        args.push(&context);
        cli::run("docker", &args, Some(&self.project_root)).await?;
        cli::run("docker", &["push", &reference], None).await?;
        info!(service = ctx.name(), image = %reference, "Pushed image to ECR");

        Ok(Self::ok(
            ctx,
            VerbDetails::Publish(PublishDetails {
                publish_time: Utc::now(),
                artifacts: vec![reference],
                version: Some(tag),
            }),
        ))
    }

    async fn backup(&self, ctx: &ServiceContext<'_>, _options: &VerbOptions) -> Result<CommandResult> {
        if Self::target(ctx) != AwsTarget::Rds {
            return Err(Self::unsupported(Verb::Backup));
        }
        let clients = self.clients().await;
        let id = self.db_instance(ctx).await?;
        let snapshot = snapshot_id(&id, Utc::now());

        debug!("Running: rds create-db-snapshot --db-snapshot-identifier {}", snapshot);
        let response = clients
            .rds
            .create_db_snapshot()
            .db_instance_identifier(&id)
            .db_snapshot_identifier(&snapshot)
            .send()
            .await
            .map_err(|e| AwsError::sdk("rds create-db-snapshot", e))?;
        let status = response
            .db_snapshot()
            .and_then(|s| s.status())
            .unwrap_or("creating")
            .to_string();

        Ok(Self::ok(
            ctx,
            VerbDetails::Backup(BackupDetails {
                backup_time: Utc::now(),
                backup_id: snapshot.clone(),
                location: Some(format!("rds:{}:{}", self.region, snapshot)),
                size_bytes: None,
            }),
        )
        .with_metadata("snapshotStatus", status))
    }

    async fn restore(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        if Self::target(ctx) != AwsTarget::Rds {
            return Err(Self::unsupported(Verb::Restore));
        }
        let backup_id = options
            .backup_id
            .clone()
            .ok_or_else(|| PlatformError::InvalidConfig("restore needs --backup-id".to_string()))?;
        let clients = self.clients().await;
        let id = self.db_instance(ctx).await?;
        let target = options
            .target
            .clone()
            .unwrap_or_else(|| format!("{}-restored", id));

        debug!(
            "Running: rds restore-db-instance-from-db-snapshot --db-instance-identifier {} --db-snapshot-identifier {}",
            target, backup_id
        );
        clients
            .rds
            .restore_db_instance_from_db_snapshot()
            .db_instance_identifier(&target)
            .db_snapshot_identifier(&backup_id)
            .send()
            .await
            .map_err(|e| AwsError::sdk("rds restore-db-instance-from-db-snapshot", e))?;

        Ok(Self::ok(
            ctx,
            VerbDetails::Restore(RestoreDetails {
                restore_time: Utc::now(),
                backup_id,
            }),
        )
        .with_metadata("restoredInstance", target.clone())
        .with_warning(format!(
            "Restored into new instance {}; point the service at it once available",
            target
        )))
    }

    async fn test(&self, _ctx: &ServiceContext<'_>, _options: &VerbOptions) -> Result<CommandResult> {
        Err(Self::unsupported(Verb::Test))
    }

    async fn exec(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        if Self::target(ctx) != AwsTarget::Ecs {
            return Err(Self::unsupported(Verb::Exec));
        }
        let command = options
            .exec_command
            .clone()
            .ok_or_else(|| PlatformError::InvalidConfig("exec needs a command".to_string()))?;
        let clients = self.clients().await;
        let resources = self.discovered(ctx).await;
        let (cluster, service) = Self::ecs_target(&resources, ctx)?;

        let tasks = clients
            .ecs
            .list_tasks()
            .cluster(&cluster)
            .service_name(&service)
            .send()
            .await
            .map_err(|e| AwsError::sdk("ecs list-tasks", e))?;
        let task = tasks
            .task_arns()
            .first()
            .cloned()
            .ok_or_else(|| AwsError::NotDiscovered {
                service: ctx.name().to_string(),
                resource: "running task".to_string(),
            })?;

        let mut args = vec![
            "ecs",
            "execute-command",
            "--region",
            self.region.as_str(),
            "--cluster",
            cluster.as_str(),
            "--task",
            task.as_str(),
            "--container",
            ctx.name(),
            "--interactive",
            "--command",
            command.as_str(),
        ];
        args.extend(profile_args(self.profile.as_deref()));
        // The session-manager plugin needs the terminal, so output is not captured
        let code = cli::attached("aws", &args, None).await?;

        let result = Self::ok(
            ctx,
            VerbDetails::Exec(ExecDetails {
                exec_time: Utc::now(),
                command: command.clone(),
                exit_code: code,
                stdout: String::new(),
                stderr: String::new(),
            }),
        );
        Ok(if code == Some(0) {
            result
        } else {
            result.failed_with(format!("{} exited with {:?}", command, code))
        })
    }

    async fn manage_secret(
        &self,
        action: SecretAction,
        path: &str,
        value: Option<&str>,
    ) -> Result<SecretOutcome> {
        let clients = self.clients().await;
        let id = secret_id(&self.environment, path);
        let mut outcome = SecretOutcome {
            path: path.to_string(),
            ..Default::default()
        };

        match action {
            SecretAction::Get => {
                let response = match clients.secrets.get_secret_value().secret_id(&id).send().await {
                    Ok(response) => response,
                    Err(e) if e.code() == Some("ResourceNotFoundException") => {
                        return Err(PlatformError::SecretNotFound(id));
                    }
                    Err(e) => return Err(AwsError::sdk("secretsmanager get-secret-value", e).into()),
                };
                outcome.value = response.secret_string().map(str::to_string);
            }
            SecretAction::Set => {
                let value = value.ok_or_else(|| {
                    PlatformError::InvalidConfig(format!("No value given for secret {}", path))
                })?;
                match clients
                    .secrets
                    .put_secret_value()
                    .secret_id(&id)
                    .secret_string(value)
                    .send()
                    .await
                {
                    Ok(_) => {}
                    Err(e) if e.code() == Some("ResourceNotFoundException") => {
                        debug!("Creating secret {}", id);
                        clients
                            .secrets
                            .create_secret()
                            .name(&id)
                            .secret_string(value)
                            .send()
                            .await
                            .map_err(|e| AwsError::sdk("secretsmanager create-secret", e))?;
                    }
                    Err(e) => return Err(AwsError::sdk("secretsmanager put-secret-value", e).into()),
                }
                outcome.changed = true;
            }
            SecretAction::List => {
                let prefix = secret_id(&self.environment, "");
                let mut token: Option<String> = None;
                loop {
                    let page = clients
                        .secrets
                        .list_secrets()
                        .max_results(100)
                        .set_next_token(token.take())
                        .send()
                        .await
                        .map_err(|e| AwsError::sdk("secretsmanager list-secrets", e))?;
                    outcome.names.extend(
                        page.secret_list()
                            .iter()
                            .filter_map(|s| s.name())
                            .filter_map(|n| n.strip_prefix(&prefix))
                            .filter(|n| n.starts_with(path))
                            .map(str::to_string),
                    );
                    match page.next_token() {
                        Some(next) => token = Some(next.to_string()),
                        None => break,
                    }
                }
                outcome.names.sort();
            }
            SecretAction::Delete => {
                match clients
                    .secrets
                    .delete_secret()
                    .secret_id(&id)
                    .recovery_window_in_days(SECRET_RECOVERY_DAYS)
                    .send()
                    .await
                {
                    Ok(_) => outcome.changed = true,
                    Err(e) if e.code() == Some("ResourceNotFoundException") => {
                        warn!("Secret {} does not exist", id);
                    }
                    Err(e) => return Err(AwsError::sdk("secretsmanager delete-secret", e).into()),
                }
            }
        }
        Ok(outcome)
    }
}
