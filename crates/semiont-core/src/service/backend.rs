use super::{
    HealthReport, Service, ServiceBase, ServiceKind, dependencies_with, resources_with,
};
use crate::requirements::{
    BuildRequirements, SecurityRequirements, ServiceRequirements, merge_requirements, presets,
};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const DEFAULT_PORT: u16 = 4000;
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// API server
#[derive(Debug)]
pub struct BackendService {
    base: ServiceBase,
}

impl BackendService {
    pub fn new(base: ServiceBase) -> Self {
        Self { base }
    }

    fn health_url(&self) -> String {
        let endpoint = self.health_endpoint();
        match &self.config().public_url {
            Some(url) => format!("{}{}", url.trim_end_matches('/'), endpoint),
            None => format!(
                "http://localhost:{}{}",
                self.port().unwrap_or(DEFAULT_PORT),
                endpoint
            ),
        }
    }
}

#[async_trait]
impl Service for BackendService {
    fn base(&self) -> &ServiceBase {
        &self.base
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Backend
    }

    fn requirements(&self) -> ServiceRequirements {
        let port = self.port().unwrap_or(DEFAULT_PORT);
        let preset = presets::stateless_web(port, &self.health_endpoint());
        let config = self.config();

        let mut secrets = vec!["JWT_SECRET".to_string(), "DATABASE_PASSWORD".to_string()];
        secrets.extend(config.secrets.iter().cloned());

        let specific = ServiceRequirements::new()
            .with_dependencies(dependencies_with(&["database"], config))
            .with_build(BuildRequirements {
                dockerfile: Some(
                    config
                        .dockerfile
                        .clone()
                        .unwrap_or_else(|| "apps/backend/Dockerfile".to_string()),
                ),
                build_context: config.build_context.clone().or_else(|| Some(".".into())),
                prebuilt: config.image.is_some() && config.dockerfile.is_none(),
                ..Default::default()
            })
            .with_resources(resources_with(preset.resources.clone(), config))
            .with_security(SecurityRequirements {
                secrets,
                run_as_non_root: true,
                ..Default::default()
            })
            .with_environment(self.environment_variables())
            .with_label("semiont.service", "backend");

        merge_requirements(preset, specific)
    }

    fn default_port(&self) -> Option<u16> {
        Some(DEFAULT_PORT)
    }

    fn health_endpoint(&self) -> String {
        self.config()
            .health_check
            .clone()
            .unwrap_or_else(|| "/api/health".to_string())
    }

    fn default_command(&self) -> Option<String> {
        Some("npm run start".to_string())
    }

    fn default_image(&self) -> Option<String> {
        Some("ghcr.io/the-ai-alliance/semiont-backend:latest".to_string())
    }

    /// GET the health endpoint with a 5 second timeout
    async fn check_health(&self) -> Option<HealthReport> {
        let url = self.health_url();
        tracing::debug!(service = %self.name(), %url, "Probing backend health");

        let client = match reqwest::Client::builder().timeout(HEALTH_TIMEOUT).build() {
            Ok(client) => client,
            Err(e) => {
                return Some(HealthReport::unhealthy(json!({ "url": url, "error": e.to_string() })));
            }
        };

        let report = match client.get(&url).send().await {
            Ok(response) => {
                let status = response.status();
                let body = response.json::<serde_json::Value>().await.ok();
                let details = json!({ "url": url, "statusCode": status.as_u16(), "body": body });
                if status.is_success() {
                    HealthReport::healthy(details)
                } else {
                    HealthReport::unhealthy(details)
                }
            }
            Err(e) => {
                let reason = if e.is_timeout() {
                    "timed out after 5s".to_string()
                } else {
                    e.to_string()
                };
                HealthReport::unhealthy(json!({ "url": url, "error": reason }))
            }
        };
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServiceConfig;
    use crate::service::test_support::base;

    #[test]
    fn test_defaults() {
        let svc = BackendService::new(base("backend", ServiceConfig::default()));
        assert_eq!(svc.port(), Some(4000));
        assert_eq!(svc.health_endpoint(), "/api/health");
        assert_eq!(svc.command().unwrap(), "npm run start");
        assert_eq!(svc.health_url(), "http://localhost:4000/api/health");
    }

    #[test]
    fn test_requirements_merge_preset_and_config() {
        let config = ServiceConfig {
            port: Some(4100),
            memory: Some("2Gi".into()),
            depends_on: vec!["filesystem".into()],
            secrets: vec!["OAUTH_CLIENT_SECRET".into()],
            ..Default::default()
        };
        let svc = BackendService::new(base("backend", config));
        let reqs = svc.requirements();

        let network = reqs.network.as_ref().unwrap();
        assert_eq!(network.ports, vec![4100]);
        assert!(network.needs_load_balancer);

        let resources = reqs.resources.as_ref().unwrap();
        assert_eq!(resources.memory.as_deref(), Some("2Gi"));
        assert_eq!(resources.cpu.as_deref(), Some("0.5"));

        let deps = &reqs.dependencies.as_ref().unwrap().services;
        assert_eq!(deps, &vec!["database".to_string(), "filesystem".to_string()]);

        let secrets = &reqs.security.as_ref().unwrap().secrets;
        assert!(secrets.contains(&"JWT_SECRET".to_string()));
        assert!(secrets.contains(&"OAUTH_CLIENT_SECRET".to_string()));

        let env = reqs.environment.as_ref().unwrap();
        assert_eq!(env.get("PORT").map(String::as_str), Some("4100"));
    }

    #[test]
    fn test_public_url_health() {
        let config = ServiceConfig {
            public_url: Some("https://api.example.org/".into()),
            ..Default::default()
        };
        let svc = BackendService::new(base("backend", config));
        assert_eq!(svc.health_url(), "https://api.example.org/api/health");
    }

    #[tokio::test]
    async fn test_health_unreachable_is_unhealthy() {
        let config = ServiceConfig {
            // Nothing listens on port 9 locally.
            port: Some(9),
            ..Default::default()
        };
        let svc = BackendService::new(base("backend", config));
        let report = svc.check_health().await.unwrap();
        assert!(!report.healthy);
        assert!(report.details.get("error").is_some());
    }
}
