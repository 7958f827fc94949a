//! Service requirements
//!
//! A platform-agnostic description of what a service needs. Services
//! produce these; platforms interpret them.

pub mod presets;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything a service asks of the platform it runs on
///
/// Every section is optional: an absent section means "no requirement",
/// not "requirement with default values".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Vec<StorageRequirement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<DependencyRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<HashMap<String, String>>,
}

impl ServiceRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network(mut self, network: NetworkRequirements) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_storage(mut self, storage: Vec<StorageRequirement>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_dependencies(mut self, dependencies: DependencyRequirements) -> Self {
        self.dependencies = Some(dependencies);
        self
    }

    pub fn with_build(mut self, build: BuildRequirements) -> Self {
        self.build = Some(build);
        self
    }

    pub fn with_resources(mut self, resources: ResourceRequirements) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn with_security(mut self, security: SecurityRequirements) -> Self {
        self.security = Some(security);
        self
    }

    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Ports from the network section, empty when there is none
    pub fn ports(&self) -> &[u16] {
        self.network.as_ref().map(|n| n.ports.as_slice()).unwrap_or(&[])
    }

    pub fn persistent_storage(&self) -> impl Iterator<Item = &StorageRequirement> {
        self.storage.iter().flatten().filter(|s| s.persistent)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.as_ref()?.get(key).map(String::as_str)
    }
}

/// Merge `override_` onto `base`.
///
/// Each section present in `override_` replaces the same section of `base`
/// wholesale; sections absent from `override_` are kept from `base`. Arrays
/// and maps inside a section are therefore replaced, never concatenated.
pub fn merge_requirements(
    base: ServiceRequirements,
    override_: ServiceRequirements,
) -> ServiceRequirements {
    ServiceRequirements {
        network: override_.network.or(base.network),
        storage: override_.storage.or(base.storage),
        dependencies: override_.dependencies.or(base.dependencies),
        build: override_.build.or(base.build),
        resources: override_.resources.or(base.resources),
        security: override_.security.or(base.security),
        environment: override_.environment.or(base.environment),
        labels: override_.labels.or(base.labels),
        annotations: override_.annotations.or(base.annotations),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequirements {
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub needs_load_balancer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_port: Option<u16>,
    /// Seconds between health checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_domains: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageRequirement {
    #[serde(default)]
    pub persistent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
    /// Size with unit, e.g. `10Gi`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
    #[serde(default)]
    pub backup: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRequirements {
    /// Internal services that must be up first
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external: Vec<ExternalDependency>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDependency {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_context: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub build_args: HashMap<String, String>,
    /// Image is pulled, never built
    #[serde(default)]
    pub prebuilt: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral_storage: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRequirements {
    /// Names of secrets the service reads at runtime
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub read_only_root_filesystem: bool,
    #[serde(default)]
    pub run_as_non_root: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<u32>,
    #[serde(default)]
    pub allow_privilege_escalation: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities_add: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities_drop: Vec<String>,
}
