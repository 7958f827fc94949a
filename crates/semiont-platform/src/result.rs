//! Verb results and the per-invocation envelope

use chrono::{DateTime, Utc};
use semiont_core::{HealthReport, PlatformType, Verb};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Live state of a service as reported by its platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Running,
    Stopped,
    Unhealthy,
    Unknown,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Running => write!(f, "running"),
            ServiceStatus::Stopped => write!(f, "stopped"),
            ServiceStatus::Unhealthy => write!(f, "unhealthy"),
            ServiceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Platform-native identifiers of a running service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum PlatformResources {
    #[serde(rename_all = "camelCase")]
    Process {
        #[serde(skip_serializing_if = "Option::is_none")]
        pid: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        port: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        log_file: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Container {
        container_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        container_id: Option<String>,
        image: String,
        #[serde(default)]
        ports: BTreeMap<u16, u16>,
    },
    /// Physical ids keyed by logical name (`clusterName`, `dbInstanceId`, ...)
    Aws { ids: BTreeMap<String, String> },
    Mock { id: String },
}

/// Tail of a service's log output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogSummary {
    pub recent: Vec<String>,
    pub errors: usize,
}

impl LogSummary {
    /// Keep the last `limit` lines and count those mentioning an error
    pub fn from_lines<'a>(lines: impl Iterator<Item = &'a str>, limit: usize) -> Self {
        let lines: Vec<&str> = lines.filter(|l| !l.trim().is_empty()).collect();
        let errors = lines
            .iter()
            .filter(|l| l.to_lowercase().contains("error"))
            .count();
        let skip = lines.len().saturating_sub(limit);
        Self {
            recent: lines[skip..].iter().map(|l| l.to_string()).collect(),
            errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartDetails {
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<PlatformResources>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopDetails {
    pub stop_time: DateTime<Utc>,
    pub graceful: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDetails {
    pub status: ServiceStatus,
    /// Whether the live platform state matched the locally recorded one
    pub state_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<PlatformResources>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<LogSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDetails {
    pub update_time: DateTime<Utc>,
    pub strategy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionDetails {
    pub provision_time: DateTime<Utc>,
    pub resources: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishDetails {
    pub publish_time: DateTime<Utc>,
    pub artifacts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDetails {
    pub backup_time: DateTime<Utc>,
    pub backup_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreDetails {
    pub restore_time: DateTime<Utc>,
    pub backup_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDetails {
    pub test_time: DateTime<Utc>,
    pub suite: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecDetails {
    pub exec_time: DateTime<Utc>,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Verb-specific half of a [`CommandResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerbDetails {
    Start(StartDetails),
    Stop(StopDetails),
    Check(CheckDetails),
    Update(UpdateDetails),
    Provision(ProvisionDetails),
    Publish(PublishDetails),
    Backup(BackupDetails),
    Restore(RestoreDetails),
    Test(TestDetails),
    Exec(ExecDetails),
}

impl VerbDetails {
    pub fn verb(&self) -> Verb {
        match self {
            VerbDetails::Start(_) => Verb::Start,
            VerbDetails::Stop(_) => Verb::Stop,
            VerbDetails::Check(_) => Verb::Check,
            VerbDetails::Update(_) => Verb::Update,
            VerbDetails::Provision(_) => Verb::Provision,
            VerbDetails::Publish(_) => Verb::Publish,
            VerbDetails::Backup(_) => Verb::Backup,
            VerbDetails::Restore(_) => Verb::Restore,
            VerbDetails::Test(_) => Verb::Test,
            VerbDetails::Exec(_) => Verb::Exec,
        }
    }
}

/// Outcome of one verb applied to one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub entity: String,
    pub platform: PlatformType,
    pub verb: Verb,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<VerbDetails>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    pub fn success(entity: impl Into<String>, platform: PlatformType, details: VerbDetails) -> Self {
        Self {
            entity: entity.into(),
            platform,
            verb: details.verb(),
            success: true,
            timestamp: Utc::now(),
            details: Some(details),
            metadata: BTreeMap::new(),
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn failure(
        entity: impl Into<String>,
        platform: PlatformType,
        verb: Verb,
        error: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            platform,
            verb,
            success: false,
            timestamp: Utc::now(),
            details: None,
            metadata: BTreeMap::new(),
            warnings: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// A mutating verb skipped because of `--dry-run`
    pub fn dry_run(entity: impl Into<String>, platform: PlatformType, verb: Verb) -> Self {
        let mut result = Self {
            entity: entity.into(),
            platform,
            verb,
            success: true,
            timestamp: Utc::now(),
            details: None,
            metadata: BTreeMap::new(),
            warnings: Vec::new(),
            error: None,
        };
        result.metadata.insert("dryRun".to_string(), Value::Bool(true));
        result
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Turn a nominal success into a failure, keeping the details
    pub fn failed_with(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    pub fn check(&self) -> Option<&CheckDetails> {
        match &self.details {
            Some(VerbDetails::Check(c)) => Some(c),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<ServiceStatus> {
        self.check().map(|c| c.status)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub warnings: usize,
}

impl Summary {
    pub fn from_results(results: &[CommandResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            warnings: results.iter().map(|r| r.warnings.len()).sum(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    pub user: String,
    pub cwd: String,
    pub dry_run: bool,
}

/// Everything one CLI invocation produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResults {
    pub command: String,
    pub environment: String,
    pub timestamp: DateTime<Utc>,
    /// Wall-clock time in milliseconds
    pub duration: u64,
    pub results: Vec<CommandResult>,
    pub summary: Summary,
    pub execution_context: ExecutionContext,
}

impl CommandResults {
    pub fn new(
        command: impl Into<String>,
        environment: impl Into<String>,
        results: Vec<CommandResult>,
        duration: Duration,
        execution_context: ExecutionContext,
    ) -> Self {
        Self {
            command: command.into(),
            environment: environment.into(),
            timestamp: Utc::now(),
            duration: duration.as_millis() as u64,
            summary: Summary::from_results(&results),
            results,
            execution_context,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }
}
