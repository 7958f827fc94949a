//! Environment-wide configuration (`environments/<env>.json`)

use super::platform::PlatformType;
use super::service::ServiceConfig;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentConfig {
    /// Environment name; filled from the file name when absent
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub platform: PlatformDefaults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<SiteConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsSettings>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
}

impl EnvironmentConfig {
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.get(name)
    }

    /// Platform for a service: its own `platform.type`, else the environment default
    pub fn platform_for(&self, service: &str) -> Result<PlatformType> {
        self.services
            .get(service)
            .and_then(|s| s.platform_type())
            .or(self.platform.default)
            .ok_or_else(|| CoreError::MissingPlatform {
                service: service.to_string(),
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<PlatformType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsSettings {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default)]
    pub stacks: StackNames,
}

/// CloudFormation stacks owning the environment's resources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackNames {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
}

impl StackNames {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.data.iter().chain(self.app.iter()).map(String::as_str)
    }
}
