//! Per-service configuration
//!
//! JSON form (inside `environments/<env>.json`):
//! ```json
//! "backend": {
//!     "platform": { "type": "container" },
//!     "port": 4000,
//!     "command": "npm run start",
//!     "environment": { "LOG_LEVEL": "info" }
//! }
//! ```

use super::platform::PlatformType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// User-supplied settings for one service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformRef>,
    /// Service subtype, e.g. `postgres` or `janusgraph`
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Health check path, e.g. `/api/health`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<String>,
    /// Working directory for process and build commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environment: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,
    /// Named volume for persistent data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    /// Keys not modelled above, kept for platform handlers
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ServiceConfig {
    pub fn platform_type(&self) -> Option<PlatformType> {
        self.platform.as_ref().map(|p| p.platform_type)
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }
}

/// `"platform": { "type": "..." }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformRef {
    #[serde(rename = "type")]
    pub platform_type: PlatformType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service_config() {
        let json = r#"{
            "platform": { "type": "container" },
            "type": "janusgraph",
            "port": 8182,
            "healthCheck": "/health",
            "dependsOn": ["database"],
            "customFlag": true
        }"#;
        let config: ServiceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.platform_type(), Some(PlatformType::Container));
        assert_eq!(config.service_type.as_deref(), Some("janusgraph"));
        assert_eq!(config.port, Some(8182));
        assert_eq!(config.depends_on, vec!["database".to_string()]);
        assert_eq!(config.extra.get("customFlag"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn test_empty_config() {
        let config: ServiceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert!(config.platform_type().is_none());
    }
}
