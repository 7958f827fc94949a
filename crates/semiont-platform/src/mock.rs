//! In-memory platform for tests and dry runs
//!
//! Performs no I/O. Keeps one record per service name plus backups, secrets
//! and a call log, and can be told to fail a given `(verb, service)`.

use crate::error::{PlatformError, Result};
use crate::result::{
    BackupDetails, CheckDetails, CommandResult, ExecDetails, PlatformResources, ProvisionDetails,
    PublishDetails, RestoreDetails, ServiceStatus, StartDetails, StopDetails, TestDetails,
    UpdateDetails, VerbDetails,
};
use crate::secrets::{SecretAction, SecretOutcome, apply_secret_action};
use crate::strategy::{PlatformStrategy, VerbOptions};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use semiont_core::{HealthReport, PlatformType, ServiceContext, Verb};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq)]
pub struct MockRecord {
    pub id: String,
    pub status: ServiceStatus,
    pub provisioned: bool,
    pub port: Option<u16>,
    pub started_at: Option<DateTime<Utc>>,
    pub version: Option<String>,
}

#[derive(Debug, Default)]
struct MockState {
    records: HashMap<String, MockRecord>,
    backups: HashMap<String, Vec<String>>,
    secrets: BTreeMap<String, String>,
    calls: Vec<(Verb, String)>,
    failures: HashSet<(Verb, String)>,
    next_id: u64,
}

#[derive(Debug, Default)]
pub struct MockPlatform {
    state: Mutex<MockState>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every later `verb` on `service` fail
    pub fn fail_on(&self, verb: Verb, service: &str) {
        self.lock().failures.insert((verb, service.to_string()));
    }

    /// Verbs invoked so far, in order
    pub fn calls(&self) -> Vec<(Verb, String)> {
        self.lock().calls.clone()
    }

    pub fn record(&self, service: &str) -> Option<MockRecord> {
        self.lock().records.get(service).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }

    pub fn running(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .records
            .iter()
            .filter(|(_, r)| r.status == ServiceStatus::Running)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Log the call and apply failure injection
    fn enter(&self, verb: Verb, service: &str) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        state.calls.push((verb, service.to_string()));
        if state.failures.contains(&(verb, service.to_string())) {
            return Err(PlatformError::Injected(format!("{} {}", verb, service)));
        }
        Ok(state)
    }

    fn ok(ctx: &ServiceContext<'_>, details: VerbDetails) -> Result<CommandResult> {
        Ok(CommandResult::success(ctx.name(), PlatformType::Mock, details))
    }
}

impl MockState {
    fn new_id(&mut self, prefix: &str, service: &str) -> String {
        self.next_id += 1;
        format!("mock-{}-{}-{}", prefix, service, self.next_id)
    }
}

#[async_trait]
impl PlatformStrategy for MockPlatform {
    fn platform_type(&self) -> PlatformType {
        PlatformType::Mock
    }

    async fn start(&self, ctx: &ServiceContext<'_>, _options: &VerbOptions) -> Result<CommandResult> {
        let mut state = self.enter(Verb::Start, ctx.name())?;
        let port = ctx.requirements.ports().first().copied();
        let id = state.new_id("svc", ctx.name());
        let provisioned = state
            .records
            .get(ctx.name())
            .map(|r| r.provisioned)
            .unwrap_or(false);
        state.records.insert(
            ctx.name().to_string(),
            MockRecord {
                id: id.clone(),
                status: ServiceStatus::Running,
                provisioned,
                port,
                started_at: Some(Utc::now()),
                version: None,
            },
        );

        Self::ok(
            ctx,
            VerbDetails::Start(StartDetails {
                start_time: Utc::now(),
                endpoint: port.map(|p| format!("http://localhost:{}", p)),
                resources: Some(PlatformResources::Mock { id }),
            }),
        )
    }

    async fn stop(&self, ctx: &ServiceContext<'_>, _options: &VerbOptions) -> Result<CommandResult> {
        let mut state = self.enter(Verb::Stop, ctx.name())?;
        let was_running = match state.records.get_mut(ctx.name()) {
            Some(record) => {
                let running = record.status == ServiceStatus::Running;
                record.status = ServiceStatus::Stopped;
                running
            }
            None => false,
        };

        Ok(CommandResult::success(
            ctx.name(),
            PlatformType::Mock,
            VerbDetails::Stop(StopDetails {
                stop_time: Utc::now(),
                graceful: true,
            }),
        )
        .with_metadata("wasRunning", was_running))
    }

    async fn check(&self, ctx: &ServiceContext<'_>, _options: &VerbOptions) -> Result<CommandResult> {
        let state = self.enter(Verb::Check, ctx.name())?;
        let record = state.records.get(ctx.name());
        let status = record.map(|r| r.status).unwrap_or(ServiceStatus::Stopped);
        let health = (status == ServiceStatus::Running)
            .then(|| HealthReport::healthy(json!({ "mock": true })));

        Self::ok(
            ctx,
            VerbDetails::Check(CheckDetails {
                status,
                state_verified: true,
                health,
                resources: record.map(|r| PlatformResources::Mock { id: r.id.clone() }),
                logs: None,
            }),
        )
    }

    async fn update(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        let mut state = self.enter(Verb::Update, ctx.name())?;
        let id = state.new_id("svc", ctx.name());
        let record = state
            .records
            .get_mut(ctx.name())
            .ok_or_else(|| PlatformError::NotFound(format!("{} is not deployed", ctx.name())))?;

        let previous_version = record.version.take();
        record.id = id;
        record.status = ServiceStatus::Running;
        record.version = options.tag.clone();

        Self::ok(
            ctx,
            VerbDetails::Update(UpdateDetails {
                update_time: Utc::now(),
                strategy: "replace".to_string(),
                previous_version,
                new_version: options.tag.clone(),
            }),
        )
    }

    async fn provision(
        &self,
        ctx: &ServiceContext<'_>,
        _options: &VerbOptions,
    ) -> Result<CommandResult> {
        let mut state = self.enter(Verb::Provision, ctx.name())?;
        let id = state.new_id("svc", ctx.name());
        state
            .records
            .entry(ctx.name().to_string())
            .or_insert_with(|| MockRecord {
                id,
                status: ServiceStatus::Stopped,
                provisioned: false,
                port: None,
                started_at: None,
                version: None,
            })
            .provisioned = true;

        let mut resources: Vec<String> = ctx
            .requirements
            .persistent_storage()
            .filter_map(|s| s.volume_name.clone())
            .map(|v| format!("volume:{}", v))
            .collect();
        resources.extend(ctx.requirements.ports().iter().map(|p| format!("port:{}", p)));

        Self::ok(
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
        )
    }

    async fn publish(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        let _state = self.enter(Verb::Publish, ctx.name())?;
        let tag = options.tag.clone().unwrap_or_else(|| "latest".to_string());
        let image = ctx.service.image();
        let repo = image.split(':').next().unwrap_or(&image);

        Self::ok(
            ctx,
            VerbDetails::Publish(PublishDetails {
                publish_time: Utc::now(),
                artifacts: vec![format!("{}:{}", repo, tag)],
                version: Some(tag),
            }),
        )
    }

    async fn backup(&self, ctx: &ServiceContext<'_>, _options: &VerbOptions) -> Result<CommandResult> {
        let mut state = self.enter(Verb::Backup, ctx.name())?;
        let backup_id = state.new_id("backup", ctx.name());
        state
            .backups
            .entry(ctx.name().to_string())
            .or_default()
            .push(backup_id.clone());

        Self::ok(
            ctx,
            VerbDetails::Backup(BackupDetails {
                backup_time: Utc::now(),
                location: Some(format!("memory://{}", backup_id)),
                backup_id,
                size_bytes: Some(0),
            }),
        )
    }

    async fn restore(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        let state = self.enter(Verb::Restore, ctx.name())?;
        let backups = state.backups.get(ctx.name()).cloned().unwrap_or_default();
        let backup_id = match &options.backup_id {
            Some(id) if backups.contains(id) => id.clone(),
            Some(id) => return Err(PlatformError::NotFound(format!("backup {}", id))),
            None => backups
                .last()
                .cloned()
                .ok_or_else(|| PlatformError::NotFound(format!("no backups for {}", ctx.name())))?,
        };

        Self::ok(
            ctx,
            VerbDetails::Restore(RestoreDetails {
                restore_time: Utc::now(),
                backup_id,
            }),
        )
    }

    async fn test(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        let _state = self.enter(Verb::Test, ctx.name())?;
        Self::ok(
            ctx,
            VerbDetails::Test(TestDetails {
                test_time: Utc::now(),
                suite: options.test_suite.clone().unwrap_or_else(|| "all".to_string()),
                passed: true,
                exit_code: Some(0),
                output: None,
            }),
        )
    }

    async fn exec(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult> {
        let _state = self.enter(Verb::Exec, ctx.name())?;
        let command = options
            .exec_command
            .clone()
            .ok_or_else(|| PlatformError::InvalidConfig("exec needs a command".to_string()))?;

        Self::ok(
            ctx,
            VerbDetails::Exec(ExecDetails {
                exec_time: Utc::now(),
                stdout: format!("mock: {}", command),
                command,
                exit_code: Some(0),
                stderr: String::new(),
            }),
        )
    }

    async fn manage_secret(
        &self,
        action: SecretAction,
        path: &str,
        value: Option<&str>,
    ) -> Result<SecretOutcome> {
        let mut state = self.lock();
        apply_secret_action(&mut state.secrets, action, path, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semiont_core::{EnvironmentConfig, RuntimeFlags, Service, ServiceConfig, ServiceFactory};
    use std::sync::Arc;

    fn service(name: &str) -> Box<dyn Service> {
        let config = ServiceConfig {
            port: Some(4000),
            command: Some("run".into()),
            ..Default::default()
        };
        ServiceFactory::create(
            name,
            PlatformType::Mock,
            &config,
            Arc::new(EnvironmentConfig {
                name: "test".into(),
                ..Default::default()
            }),
            RuntimeFlags::default(),
            None,
        )
    }

    async fn status(platform: &MockPlatform, ctx: &ServiceContext<'_>) -> ServiceStatus {
        platform
            .check(ctx, &VerbOptions::default())
            .await
            .unwrap()
            .status()
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_check_stop_round_trip() {
        let platform = MockPlatform::new();
        let svc = service("backend");
        let ctx = ServiceContext::new(svc.as_ref());
        let opts = VerbOptions::default();

        assert_eq!(status(&platform, &ctx).await, ServiceStatus::Stopped);

        platform.start(&ctx, &opts).await.unwrap();
        assert_eq!(status(&platform, &ctx).await, ServiceStatus::Running);

        platform.stop(&ctx, &opts).await.unwrap();
        assert_eq!(status(&platform, &ctx).await, ServiceStatus::Stopped);
    }

    #[tokio::test]
    async fn test_restart_keeps_single_record() {
        let platform = MockPlatform::new();
        let svc = service("backend");
        let ctx = ServiceContext::new(svc.as_ref());
        let opts = VerbOptions::default();

        platform.start(&ctx, &opts).await.unwrap();
        platform.stop(&ctx, &opts).await.unwrap();
        platform.start(&ctx, &opts).await.unwrap();

        assert_eq!(platform.record_count(), 1);
        assert_eq!(platform.running(), vec!["backend"]);
    }

    #[tokio::test]
    async fn test_backup_then_restore_latest() {
        let platform = MockPlatform::new();
        let svc = service("database");
        let ctx = ServiceContext::new(svc.as_ref());
        let opts = VerbOptions::default();

        assert!(platform.restore(&ctx, &opts).await.is_err());
        platform.backup(&ctx, &opts).await.unwrap();
        let second = platform.backup(&ctx, &opts).await.unwrap();
        let Some(VerbDetails::Backup(backup)) = second.details else {
            panic!("expected backup details");
        };

        let restored = platform.restore(&ctx, &opts).await.unwrap();
        let Some(VerbDetails::Restore(restore)) = restored.details else {
            panic!("expected restore details");
        };
        assert_eq!(restore.backup_id, backup.backup_id);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let platform = MockPlatform::new();
        platform.fail_on(Verb::Stop, "backend");
        let svc = service("backend");
        let ctx = ServiceContext::new(svc.as_ref());

        let err = platform.stop(&ctx, &VerbOptions::default()).await.unwrap_err();
        assert!(matches!(err, PlatformError::Injected(_)));
        assert_eq!(platform.calls(), vec![(Verb::Stop, "backend".to_string())]);
    }

    #[tokio::test]
    async fn test_secrets() {
        let platform = MockPlatform::new();
        platform
            .manage_secret(SecretAction::Set, "JWT_SECRET", Some("abc"))
            .await
            .unwrap();
        let got = platform
            .manage_secret(SecretAction::Get, "JWT_SECRET", None)
            .await
            .unwrap();
        assert_eq!(got.value.as_deref(), Some("abc"));
    }
}
