//! Per-service state files
//!
//! Each service gets `.semiont/state/<env>/<service>.json` recording what
//! the last verb left behind (pid, container id, endpoint) and, for AWS,
//! the CloudFormation discovery cache.

use crate::error::{PlatformError, Result};
use crate::result::ServiceStatus;
use chrono::{DateTime, Utc};
use semiont_core::PlatformType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".semiont/state";

/// How long discovered cloud resource ids are trusted, in milliseconds
pub const DISCOVERY_TTL_MS: i64 = 3_600_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceState {
    #[serde(default = "default_version")]
    pub version: u32,
    pub entity: String,
    pub platform: PlatformType,
    pub environment: String,
    pub status: ServiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Discovered CloudFormation physical ids, keyed by logical name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfn_resources: Option<BTreeMap<String, String>>,
    /// Unix epoch milliseconds of the discovery that filled `cfn_resources`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfn_discovered_at: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl ServiceState {
    pub fn new(
        entity: impl Into<String>,
        platform: PlatformType,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            version: STATE_VERSION,
            entity: entity.into(),
            platform,
            environment: environment.into(),
            status: ServiceStatus::Unknown,
            pid: None,
            container_id: None,
            port: None,
            endpoint: None,
            started_at: None,
            updated_at: Utc::now(),
            cfn_resources: None,
            cfn_discovered_at: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = status;
        self
    }

    /// Record a fresh discovery pass
    pub fn set_discovery(&mut self, resources: BTreeMap<String, String>, now_ms: i64) {
        self.cfn_resources = Some(resources);
        self.cfn_discovered_at = Some(now_ms);
        self.updated_at = Utc::now();
    }
}

/// Whether `state`'s discovery cache may be used instead of querying again
///
/// Trusted only when present, younger than [`DISCOVERY_TTL_MS`], and the
/// caller did not ask for forced discovery.
pub fn is_discovery_fresh(state: Option<&ServiceState>, now_ms: i64, force: bool) -> bool {
    if force {
        return false;
    }
    match state {
        Some(ServiceState {
            cfn_resources: Some(_),
            cfn_discovered_at: Some(at),
            ..
        }) => now_ms - at < DISCOVERY_TTL_MS,
        _ => false,
    }
}

/// Reads and writes service state files under a project root
#[derive(Debug, Clone)]
pub struct StateManager {
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    fn env_dir(&self, environment: &str) -> PathBuf {
        self.project_root.join(STATE_DIR).join(environment)
    }

    pub fn state_path(&self, environment: &str, service: &str) -> PathBuf {
        self.env_dir(environment).join(format!("{}.json", service))
    }

    pub async fn load(&self, environment: &str, service: &str) -> Result<Option<ServiceState>> {
        let path = self.state_path(environment, service);
        if !path.exists() {
            tracing::debug!("No state for {}/{}", environment, service);
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let state: ServiceState = serde_json::from_str(&content)
            .map_err(|e| PlatformError::StateError(format!("{}: {}", path.display(), e)))?;

        if state.version > STATE_VERSION {
            return Err(PlatformError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        Ok(Some(state))
    }

    /// Like [`load`](Self::load) but an unreadable file counts as absent
    pub async fn load_or_default(&self, environment: &str, service: &str) -> Option<ServiceState> {
        match self.load(environment, service).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Ignoring unreadable state for {}: {}", service, e);
                None
            }
        }
    }

    pub async fn save(&self, state: &ServiceState) -> Result<()> {
        let dir = self.env_dir(&state.environment);
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }

        let path = self.state_path(&state.environment, &state.entity);
        let mut state = state.clone();
        state.updated_at = Utc::now();
        let content = serde_json::to_string_pretty(&state)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved state for {}/{}", state.environment, state.entity);
        Ok(())
    }

    pub async fn remove(&self, environment: &str, service: &str) -> Result<()> {
        let path = self.state_path(environment, service);
        if path.exists() {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }

    /// All readable state files for an environment
    pub async fn list(&self, environment: &str) -> Result<Vec<ServiceState>> {
        let dir = self.env_dir(environment);
        let mut states = Vec::new();
        if !dir.exists() {
            return Ok(states);
        }

        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(service) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(state) = self.load_or_default(environment, service).await {
                states.push(state);
            }
        }
        states.sort_by(|a, b| a.entity.cmp(&b.entity));
        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn discovered(at: i64) -> ServiceState {
        let mut state = ServiceState::new("backend", PlatformType::Aws, "production");
        state.set_discovery(
            BTreeMap::from([("clusterName".to_string(), "semiont-prod".to_string())]),
            at,
        );
        state
    }

    #[tokio::test]
    async fn test_state_save_load() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = ServiceState::new("backend", PlatformType::Process, "local")
            .with_status(ServiceStatus::Running);
        state.pid = Some(4242);
        manager.save(&state).await.unwrap();

        let loaded = manager.load("local", "backend").await.unwrap().unwrap();
        assert_eq!(loaded.pid, Some(4242));
        assert_eq!(loaded.status, ServiceStatus::Running);
        assert!(
            temp_dir
                .path()
                .join(".semiont/state/local/backend.json")
                .exists()
        );
    }

    #[tokio::test]
    async fn test_missing_state() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        assert!(manager.load("local", "backend").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_state_is_error_but_ignorable() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        let path = manager.state_path("local", "backend");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ nope").unwrap();

        assert!(manager.load("local", "backend").await.is_err());
        assert!(manager.load_or_default("local", "backend").await.is_none());
    }

    #[tokio::test]
    async fn test_list_and_remove() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        for name in ["frontend", "backend"] {
            manager
                .save(&ServiceState::new(name, PlatformType::Mock, "local"))
                .await
                .unwrap();
        }

        let names: Vec<String> = manager
            .list("local")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.entity)
            .collect();
        assert_eq!(names, vec!["backend", "frontend"]);

        manager.remove("local", "backend").await.unwrap();
        assert_eq!(manager.list("local").await.unwrap().len(), 1);
    }

    #[test]
    fn test_discovery_freshness() {
        let now = 10 * DISCOVERY_TTL_MS;
        let fresh = discovered(now - 1_000);
        let stale = discovered(now - DISCOVERY_TTL_MS);

        assert!(is_discovery_fresh(Some(&fresh), now, false));
        assert!(!is_discovery_fresh(Some(&fresh), now, true));
        assert!(!is_discovery_fresh(Some(&stale), now, false));
        assert!(!is_discovery_fresh(None, now, false));
        assert!(!is_discovery_fresh(
            Some(&ServiceState::new("backend", PlatformType::Aws, "production")),
            now,
            false
        ));
    }
}
