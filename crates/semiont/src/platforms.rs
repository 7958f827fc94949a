//! Platform construction for one invocation

use anyhow::Context;
use semiont_aws::AwsPlatform;
use semiont_config::ServiceDeployment;
use semiont_container::{ContainerPlatform, ContainerRuntime, register_health_checks};
use semiont_core::{EnvironmentConfig, PlatformType};
use semiont_platform::{HandlerRegistry, MockPlatform, PlatformStrategy, ProcessPlatform};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// The platforms a command needs, plus the handlers registered for them
#[derive(Default)]
pub struct PlatformSet {
    platforms: HashMap<PlatformType, Arc<dyn PlatformStrategy>>,
    pub registry: HandlerRegistry,
}

impl PlatformSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every platform `deployments` refer to
    ///
    /// The container runtime is only looked up when a service runs in a
    /// container, and AWS clients only load when a service runs on AWS.
    pub async fn for_deployments(
        project_root: &Path,
        environment: &EnvironmentConfig,
        deployments: &[ServiceDeployment],
    ) -> anyhow::Result<Self> {
        let mut set = Self::new();
        for deployment in deployments {
            if set.platforms.contains_key(&deployment.platform) {
                continue;
            }
            set.build(project_root, environment, deployment.platform)
                .await?;
        }
        Ok(set)
    }

    pub async fn build(
        &mut self,
        project_root: &Path,
        environment: &EnvironmentConfig,
        platform: PlatformType,
    ) -> anyhow::Result<Arc<dyn PlatformStrategy>> {
        if let Some(existing) = self.platforms.get(&platform) {
            return Ok(existing.clone());
        }
        let built: Arc<dyn PlatformStrategy> = match platform {
            PlatformType::Process => {
                Arc::new(ProcessPlatform::new(project_root, &environment.name))
            }
            PlatformType::Container => {
                let runtime = Arc::new(ContainerRuntime::detect().await?);
                register_health_checks(&mut self.registry, runtime.clone());
                Arc::new(ContainerPlatform::new(
                    runtime,
                    project_root,
                    &environment.name,
                ))
            }
            PlatformType::Aws => Arc::new(
                AwsPlatform::new(project_root, environment)
                    .with_context(|| format!("Cannot use AWS in '{}'", environment.name))?,
            ),
            PlatformType::Mock => Arc::new(MockPlatform::new()),
        };
        tracing::debug!(%platform, "Platform ready");
        self.platforms.insert(platform, built.clone());
        Ok(built)
    }

    /// Use `platform` instead of building one
    pub fn insert(&mut self, platform: Arc<dyn PlatformStrategy>) {
        self.platforms.insert(platform.platform_type(), platform);
    }

    pub fn get(&self, platform: PlatformType) -> Option<&Arc<dyn PlatformStrategy>> {
        self.platforms.get(&platform)
    }
}
