use super::{Service, ServiceBase, ServiceKind, dependencies_with, resources_with};
use crate::requirements::{BuildRequirements, ServiceRequirements, merge_requirements, presets};
use async_trait::async_trait;
use std::collections::HashMap;

const DEFAULT_PORT: u16 = 3000;

/// Web UI
#[derive(Debug)]
pub struct FrontendService {
    base: ServiceBase,
}

impl FrontendService {
    pub fn new(base: ServiceBase) -> Self {
        Self { base }
    }

    /// Where the UI reaches the API, derived from the backend's settings
    fn backend_url(&self) -> Option<String> {
        let backend = self.environment().service("backend")?;
        Some(match &backend.public_url {
            Some(url) => url.clone(),
            None => format!("http://localhost:{}", backend.port.unwrap_or(4000)),
        })
    }
}

#[async_trait]
impl Service for FrontendService {
    fn base(&self) -> &ServiceBase {
        &self.base
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Frontend
    }

    fn requirements(&self) -> ServiceRequirements {
        let port = self.port().unwrap_or(DEFAULT_PORT);
        let preset = presets::stateless_web(port, &self.health_endpoint());
        let config = self.config();

        let specific = ServiceRequirements::new()
            .with_dependencies(dependencies_with(&["backend"], config))
            .with_build(BuildRequirements {
                dockerfile: Some(
                    config
                        .dockerfile
                        .clone()
                        .unwrap_or_else(|| "apps/frontend/Dockerfile".to_string()),
                ),
                build_context: config.build_context.clone().or_else(|| Some(".".into())),
                prebuilt: config.image.is_some() && config.dockerfile.is_none(),
                ..Default::default()
            })
            .with_resources(resources_with(preset.resources.clone(), config))
            .with_environment(self.environment_variables())
            .with_label("semiont.service", "frontend");

        merge_requirements(preset, specific)
    }

    fn default_port(&self) -> Option<u16> {
        Some(DEFAULT_PORT)
    }

    fn health_endpoint(&self) -> String {
        self.config()
            .health_check
            .clone()
            .unwrap_or_else(|| "/".to_string())
    }

    fn default_command(&self) -> Option<String> {
        Some("npm run start".to_string())
    }

    fn default_image(&self) -> Option<String> {
        Some("ghcr.io/the-ai-alliance/semiont-frontend:latest".to_string())
    }

    fn environment_variables(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("SEMIONT_ENV".to_string(), self.environment_name().to_string());
        vars.insert("SEMIONT_SERVICE".to_string(), self.name().to_string());
        vars.insert(
            "PORT".to_string(),
            self.port().unwrap_or(DEFAULT_PORT).to_string(),
        );
        if let Some(url) = self.backend_url() {
            vars.insert("SERVER_API_URL".to_string(), url);
        }
        vars.extend(self.config().environment.clone());
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnvironmentConfig, PlatformType, ServiceConfig};
    use crate::service::RuntimeFlags;
    use std::sync::Arc;

    #[test]
    fn test_backend_url_from_environment() {
        let mut env = EnvironmentConfig {
            name: "local".into(),
            ..Default::default()
        };
        env.services.insert(
            "backend".into(),
            ServiceConfig {
                port: Some(4100),
                ..Default::default()
            },
        );
        let svc = FrontendService::new(ServiceBase::new(
            "frontend",
            PlatformType::Process,
            ServiceConfig::default(),
            Arc::new(env),
            RuntimeFlags::default(),
        ));

        let vars = svc.environment_variables();
        assert_eq!(vars["SERVER_API_URL"], "http://localhost:4100");
        assert_eq!(vars["PORT"], "3000");
        assert_eq!(vars["SEMIONT_ENV"], "local");
    }

    #[test]
    fn test_depends_on_backend() {
        let svc = FrontendService::new(crate::service::test_support::base(
            "frontend",
            ServiceConfig::default(),
        ));
        let reqs = svc.requirements();
        assert_eq!(reqs.dependencies.unwrap().services, vec!["backend".to_string()]);
        assert_eq!(reqs.network.unwrap().health_check_path.as_deref(), Some("/"));
    }
}
