use super::{Service, ServiceBase, ServiceKind, dependencies_with, resources_with};
use crate::requirements::{SecurityRequirements, ServiceRequirements, merge_requirements, presets};
use async_trait::async_trait;

/// Background AI agent worker
#[derive(Debug)]
pub struct AgentService {
    base: ServiceBase,
}

impl AgentService {
    pub fn new(base: ServiceBase) -> Self {
        Self { base }
    }
}

#[async_trait]
impl Service for AgentService {
    fn base(&self) -> &ServiceBase {
        &self.base
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Agent
    }

    fn requirements(&self) -> ServiceRequirements {
        let preset = presets::worker();
        let config = self.config();

        let mut secrets = vec!["SEMIONT_API_TOKEN".to_string()];
        secrets.extend(config.secrets.iter().cloned());

        let specific = ServiceRequirements::new()
            .with_dependencies(dependencies_with(&["backend"], config))
            .with_resources(resources_with(preset.resources.clone(), config))
            .with_security(SecurityRequirements {
                secrets,
                run_as_non_root: true,
                ..Default::default()
            })
            .with_environment(self.environment_variables())
            .with_label("semiont.service", "agent");

        merge_requirements(preset, specific)
    }
}
