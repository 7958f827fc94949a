//! Service definitions
//!
//! A [`Service`] turns one entry of the environment's `services` table into
//! [`ServiceRequirements`] plus a handful of accessors that platforms use
//! (port, command, image, environment variables). Each logical service type
//! is its own struct; everything they share lives in [`ServiceBase`] and in
//! the trait's default methods, so a variant only overrides what differs.

mod agent;
mod backend;
mod database;
mod filesystem;
mod frontend;
mod generic;
mod mcp;

pub use agent::AgentService;
pub use backend::BackendService;
pub use database::{DatabaseEngine, DatabaseService};
pub use filesystem::FilesystemService;
pub use frontend::FrontendService;
pub use generic::GenericService;
pub use mcp::McpService;

use crate::error::{CoreError, Result};
use crate::model::{EnvironmentConfig, PlatformType, ServiceConfig};
use crate::requirements::{
    BuildRequirements, DependencyRequirements, NetworkRequirements, ResourceRequirements,
    SecurityRequirements, ServiceRequirements, StorageRequirement,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Built-in service variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Backend,
    Frontend,
    Database,
    Filesystem,
    Agent,
    Mcp,
    Generic,
}

impl ServiceKind {
    /// Variant for a service name; anything unrecognised is generic
    pub fn from_name(name: &str) -> Self {
        match name {
            "backend" => ServiceKind::Backend,
            "frontend" => ServiceKind::Frontend,
            "database" => ServiceKind::Database,
            "filesystem" => ServiceKind::Filesystem,
            "agent" => ServiceKind::Agent,
            "mcp" => ServiceKind::Mcp,
            _ => ServiceKind::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Backend => "backend",
            ServiceKind::Frontend => "frontend",
            ServiceKind::Database => "database",
            ServiceKind::Filesystem => "filesystem",
            ServiceKind::Agent => "agent",
            ServiceKind::Mcp => "mcp",
            ServiceKind::Generic => "generic",
        }
    }

    /// Position in startup order; dependencies come first
    pub fn startup_rank(&self) -> u8 {
        match self {
            ServiceKind::Database => 0,
            ServiceKind::Filesystem => 1,
            ServiceKind::Backend => 2,
            ServiceKind::Frontend => 3,
            ServiceKind::Mcp => 4,
            ServiceKind::Agent => 5,
            ServiceKind::Generic => 6,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-invocation switches passed down from the CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeFlags {
    pub verbose: bool,
    pub quiet: bool,
    pub dry_run: bool,
    pub force_discovery: bool,
}

/// State every service variant carries
#[derive(Debug, Clone)]
pub struct ServiceBase {
    pub name: String,
    pub platform: PlatformType,
    pub config: ServiceConfig,
    pub environment: Arc<EnvironmentConfig>,
    pub flags: RuntimeFlags,
}

impl ServiceBase {
    pub fn new(
        name: impl Into<String>,
        platform: PlatformType,
        config: ServiceConfig,
        environment: Arc<EnvironmentConfig>,
        flags: RuntimeFlags,
    ) -> Self {
        Self {
            name: name.into(),
            platform,
            config,
            environment,
            flags,
        }
    }
}

/// Outcome of a service-level health check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl HealthReport {
    pub fn healthy(details: serde_json::Value) -> Self {
        Self {
            healthy: true,
            details,
        }
    }

    pub fn unhealthy(details: serde_json::Value) -> Self {
        Self {
            healthy: false,
            details,
        }
    }
}

/// A logical service bound to a platform for one command invocation
#[async_trait]
pub trait Service: Send + Sync + fmt::Debug {
    fn base(&self) -> &ServiceBase;

    fn kind(&self) -> ServiceKind;

    /// What this service needs from its platform
    fn requirements(&self) -> ServiceRequirements;

    fn name(&self) -> &str {
        &self.base().name
    }

    fn platform(&self) -> PlatformType {
        self.base().platform
    }

    fn config(&self) -> &ServiceConfig {
        &self.base().config
    }

    fn environment(&self) -> &EnvironmentConfig {
        &self.base().environment
    }

    fn environment_name(&self) -> &str {
        &self.base().environment.name
    }

    fn flags(&self) -> RuntimeFlags {
        self.base().flags
    }

    /// Key used for handler lookup: the configured `type`, else the variant name
    fn service_type(&self) -> &str {
        self.config()
            .service_type
            .as_deref()
            .unwrap_or_else(|| self.kind().as_str())
    }

    fn default_port(&self) -> Option<u16> {
        None
    }

    fn port(&self) -> Option<u16> {
        self.config().port.or_else(|| self.default_port())
    }

    fn health_endpoint(&self) -> String {
        self.config()
            .health_check
            .clone()
            .unwrap_or_else(|| "/health".to_string())
    }

    fn default_command(&self) -> Option<String> {
        None
    }

    /// Command that runs the service. Fails rather than guessing when
    /// neither the configuration nor the variant provides one.
    fn command(&self) -> Result<String> {
        self.config()
            .command
            .clone()
            .or_else(|| self.default_command())
            .ok_or_else(|| CoreError::MissingCommand {
                service: self.name().to_string(),
            })
    }

    fn default_image(&self) -> Option<String> {
        None
    }

    fn image(&self) -> String {
        self.config()
            .image
            .clone()
            .or_else(|| self.default_image())
            .unwrap_or_else(|| format!("semiont-{}:latest", self.name()))
    }

    /// Variables injected into the running service; configuration wins
    fn environment_variables(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("SEMIONT_ENV".to_string(), self.environment_name().to_string());
        vars.insert("SEMIONT_SERVICE".to_string(), self.name().to_string());
        if let Some(port) = self.port() {
            vars.insert("PORT".to_string(), port.to_string());
        }
        vars.extend(self.config().environment.clone());
        vars
    }

    async fn pre_start(&self) -> Result<()> {
        Ok(())
    }

    async fn post_start(&self) -> Result<()> {
        Ok(())
    }

    async fn pre_stop(&self) -> Result<()> {
        Ok(())
    }

    async fn post_stop(&self) -> Result<()> {
        Ok(())
    }

    /// Service-level health check; `None` when the service has none
    async fn check_health(&self) -> Option<HealthReport> {
        None
    }
}

/// A service together with its resolved requirements, as handed to platforms
pub struct ServiceContext<'a> {
    pub service: &'a dyn Service,
    pub requirements: ServiceRequirements,
}

impl<'a> ServiceContext<'a> {
    pub fn new(service: &'a dyn Service) -> Self {
        Self {
            requirements: service.requirements(),
            service,
        }
    }

    pub fn name(&self) -> &str {
        self.service.name()
    }

    pub fn environment_name(&self) -> &str {
        self.service.environment_name()
    }

    pub fn flags(&self) -> RuntimeFlags {
        self.service.flags()
    }
}

/// Requirements derived purely from a service's configuration
///
/// Sections are only emitted for settings the user actually supplied.
pub fn requirements_from_config(config: &ServiceConfig) -> ServiceRequirements {
    let mut reqs = ServiceRequirements::new();

    if let Some(port) = config.port {
        reqs.network = Some(NetworkRequirements {
            ports: vec![port],
            health_check_path: config.health_check.clone(),
            health_check_port: config.health_check.as_ref().map(|_| port),
            ..Default::default()
        });
    }

    if config.volume.is_some() || config.mount_path.is_some() {
        reqs.storage = Some(vec![StorageRequirement {
            persistent: true,
            volume_name: config.volume.clone(),
            size: config.storage_size.clone(),
            mount_path: config.mount_path.clone(),
            backup: true,
        }]);
    }

    if !config.depends_on.is_empty() {
        reqs.dependencies = Some(DependencyRequirements {
            services: config.depends_on.clone(),
            external: Vec::new(),
        });
    }

    if config.dockerfile.is_some() || config.build_context.is_some() {
        reqs.build = Some(BuildRequirements {
            dockerfile: config.dockerfile.clone(),
            build_context: config.build_context.clone(),
            ..Default::default()
        });
    } else if config.image.is_some() {
        reqs.build = Some(BuildRequirements {
            prebuilt: true,
            ..Default::default()
        });
    }

    if config.cpu.is_some() || config.memory.is_some() || config.replicas.is_some() {
        reqs.resources = Some(ResourceRequirements {
            cpu: config.cpu.clone(),
            memory: config.memory.clone(),
            replicas: config.replicas,
            ..Default::default()
        });
    }

    if !config.secrets.is_empty() {
        reqs.security = Some(SecurityRequirements {
            secrets: config.secrets.clone(),
            ..Default::default()
        });
    }

    if !config.environment.is_empty() {
        reqs.environment = Some(config.environment.clone());
    }

    reqs
}

/// Dependency list: the variant's fixed dependencies plus configured ones
pub(crate) fn dependencies_with(fixed: &[&str], config: &ServiceConfig) -> DependencyRequirements {
    let mut services: Vec<String> = fixed.iter().map(|s| s.to_string()).collect();
    for dep in &config.depends_on {
        if !services.contains(dep) {
            services.push(dep.clone());
        }
    }
    DependencyRequirements {
        services,
        external: Vec::new(),
    }
}

/// Resources from the preset, with configured values taking precedence
pub(crate) fn resources_with(
    preset: Option<ResourceRequirements>,
    config: &ServiceConfig,
) -> ResourceRequirements {
    let preset = preset.unwrap_or_default();
    ResourceRequirements {
        cpu: config.cpu.clone().or(preset.cpu),
        memory: config.memory.clone().or(preset.memory),
        replicas: config.replicas.or(preset.replicas),
        ..preset
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_name() {
        assert_eq!(ServiceKind::from_name("backend"), ServiceKind::Backend);
        assert_eq!(ServiceKind::from_name("mcp"), ServiceKind::Mcp);
        assert_eq!(ServiceKind::from_name("redis"), ServiceKind::Generic);
    }

    #[test]
    fn test_startup_rank_puts_database_first() {
        assert!(ServiceKind::Database.startup_rank() < ServiceKind::Backend.startup_rank());
        assert!(ServiceKind::Backend.startup_rank() < ServiceKind::Frontend.startup_rank());
    }

    #[test]
    fn test_requirements_from_empty_config() {
        assert_eq!(
            requirements_from_config(&ServiceConfig::default()),
            ServiceRequirements::new()
        );
    }

    #[test]
    fn test_requirements_from_config() {
        let config = ServiceConfig {
            port: Some(6379),
            image: Some("redis:7-alpine".into()),
            volume: Some("redis-data".into()),
            secrets: vec!["REDIS_PASSWORD".into()],
            ..Default::default()
        };
        let reqs = requirements_from_config(&config);
        assert_eq!(reqs.ports(), &[6379]);
        assert!(reqs.build.as_ref().unwrap().prebuilt);
        assert_eq!(reqs.persistent_storage().count(), 1);
        assert_eq!(reqs.security.unwrap().secrets, vec!["REDIS_PASSWORD".to_string()]);
        assert!(reqs.dependencies.is_none());
    }

    #[test]
    fn test_dependencies_with_dedups() {
        let config = ServiceConfig {
            depends_on: vec!["database".into(), "cache".into()],
            ..Default::default()
        };
        let deps = dependencies_with(&["database"], &config);
        assert_eq!(deps.services, vec!["database".to_string(), "cache".to_string()]);
    }
}
