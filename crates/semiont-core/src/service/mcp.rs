use super::{Service, ServiceBase, ServiceKind, dependencies_with};
use crate::requirements::{SecurityRequirements, ServiceRequirements, merge_requirements, presets};
use async_trait::async_trait;

/// Model Context Protocol bridge to the backend API
#[derive(Debug)]
pub struct McpService {
    base: ServiceBase,
}

impl McpService {
    pub fn new(base: ServiceBase) -> Self {
        Self { base }
    }
}

#[async_trait]
impl Service for McpService {
    fn base(&self) -> &ServiceBase {
        &self.base
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Mcp
    }

    fn requirements(&self) -> ServiceRequirements {
        let config = self.config();
        let mut secrets = vec!["SEMIONT_API_TOKEN".to_string()];
        secrets.extend(config.secrets.iter().cloned());

        let specific = ServiceRequirements::new()
            .with_dependencies(dependencies_with(&["backend"], config))
            .with_security(SecurityRequirements {
                secrets,
                ..Default::default()
            })
            .with_environment(self.environment_variables())
            .with_label("semiont.service", "mcp");

        merge_requirements(presets::worker(), specific)
    }

    fn default_command(&self) -> Option<String> {
        Some("npx -y @semiont/mcp-server".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServiceConfig;
    use crate::service::test_support::base;

    #[test]
    fn test_default_command() {
        let svc = McpService::new(base("mcp", ServiceConfig::default()));
        assert_eq!(svc.command().unwrap(), "npx -y @semiont/mcp-server");
        assert!(svc.port().is_none());
    }
}
