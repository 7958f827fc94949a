//! Semiont configuration
//!
//! Finds the project root, lists and loads `environments/<env>.json`, and
//! resolves which services a command targets.

pub mod error;
pub mod init;

pub use error::*;

use semiont_core::{EnvironmentConfig, PlatformType, ServiceConfig, ServiceKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const PROJECT_FILE: &str = "semiont.json";
pub const ENVIRONMENTS_DIR: &str = "environments";

/// Contents of `semiont.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_environment: Option<String>,
}

/// Locate the project root
///
/// An explicit root (from `--root` or `SEMIONT_ROOT`, already read by the
/// caller) is trusted when it contains `semiont.json`. Otherwise walk up
/// from `start` looking for one.
#[tracing::instrument(skip_all)]
pub fn find_project_root(explicit: Option<&Path>, start: &Path) -> Result<PathBuf> {
    if let Some(root) = explicit {
        debug!(root = %root.display(), "Checking explicit project root");
        if root.join(PROJECT_FILE).exists() {
            return Ok(root.to_path_buf());
        }
        warn!(root = %root.display(), "Explicit project root has no semiont.json");
    }

    let mut current = start.to_path_buf();
    loop {
        if current.join(PROJECT_FILE).exists() {
            info!(project_root = %current.display(), "Found project root");
            return Ok(current);
        }
        if !current.pop() {
            break;
        }
    }

    Err(ConfigError::ProjectRootNotFound(start.to_path_buf()))
}

pub fn load_project(root: &Path) -> Result<ProjectConfig> {
    let path = root.join(PROJECT_FILE);
    read_json(&path)
}

/// Environment names, sorted, from `environments/*.json`
pub fn list_environments(root: &Path) -> Vec<String> {
    let pattern = root.join(ENVIRONMENTS_DIR).join("*.json");
    let Some(pattern) = pattern.to_str() else {
        return Vec::new();
    };

    let mut names: Vec<String> = match glob::glob(pattern) {
        Ok(paths) => paths
            .filter_map(|p| p.ok())
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect(),
        Err(e) => {
            warn!("Invalid environment glob: {}", e);
            Vec::new()
        }
    };
    names.sort();
    names
}

pub fn environment_path(root: &Path, name: &str) -> PathBuf {
    root.join(ENVIRONMENTS_DIR).join(format!("{}.json", name))
}

/// Load one environment file; `name` is filled in when the file omits it
pub fn load_environment(root: &Path, name: &str) -> Result<EnvironmentConfig> {
    let path = environment_path(root, name);
    if !path.exists() {
        return Err(ConfigError::EnvironmentNotFound {
            name: name.to_string(),
            available: list_environments(root),
        });
    }

    let mut env: EnvironmentConfig = read_json(&path)?;
    if env.name.is_empty() {
        env.name = name.to_string();
    }
    debug!(environment = name, services = env.services.len(), "Loaded environment");
    Ok(env)
}

/// Pick the environment: requested name, else the project default
pub fn resolve_environment(
    root: &Path,
    requested: Option<&str>,
    project: Option<&ProjectConfig>,
) -> Result<EnvironmentConfig> {
    let name = requested
        .map(str::to_string)
        .or_else(|| project.and_then(|p| p.default_environment.clone()));

    match name {
        Some(name) => load_environment(root, &name),
        None => Err(ConfigError::EnvironmentNotSpecified {
            available: list_environments(root),
        }),
    }
}

/// One service as targeted by a command
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDeployment {
    pub name: String,
    pub platform: PlatformType,
    pub config: ServiceConfig,
}

/// Services selected by `--service` (a name or `all`), in startup order
///
/// Startup order puts storage first and consumers last; ties break by name.
pub fn resolve_services(env: &EnvironmentConfig, selector: &str) -> Result<Vec<ServiceDeployment>> {
    let names: Vec<&String> = if selector == "all" {
        env.services.keys().collect()
    } else {
        match env.services.get_key_value(selector) {
            Some((name, _)) => vec![name],
            None => {
                return Err(ConfigError::UnknownService {
                    name: selector.to_string(),
                    known: env.services.keys().cloned().collect(),
                });
            }
        }
    };

    let mut deployments = names
        .into_iter()
        .map(|name| {
            Ok(ServiceDeployment {
                name: name.clone(),
                platform: env.platform_for(name)?,
                config: env.services[name].clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    deployments.sort_by(|a, b| {
        let rank = |d: &ServiceDeployment| ServiceKind::from_name(&d.name).startup_rank();
        rank(a).cmp(&rank(b)).then_with(|| a.name.cmp(&b.name))
    });
    Ok(deployments)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
