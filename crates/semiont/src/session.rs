//! Project, environment and flags resolved once per invocation

use crate::executor::Executor;
use crate::platforms::PlatformSet;
use semiont_config::ServiceDeployment;
use semiont_core::{EnvironmentConfig, RuntimeFlags};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Session {
    pub project_root: PathBuf,
    pub environment: Arc<EnvironmentConfig>,
    pub flags: RuntimeFlags,
    /// Directory the command was run from
    pub cwd: PathBuf,
    pub user: String,
}

impl Session {
    /// Locate the project from `root` or `cwd` and load the environment
    pub fn load(
        root: Option<&Path>,
        cwd: &Path,
        user: &str,
        environment: Option<&str>,
        flags: RuntimeFlags,
    ) -> anyhow::Result<Self> {
        let project_root = semiont_config::find_project_root(root, cwd)?;
        let project = semiont_config::load_project(&project_root).ok();
        let environment =
            semiont_config::resolve_environment(&project_root, environment, project.as_ref())?;
        tracing::debug!(
            root = %project_root.display(),
            environment = %environment.name,
            "Session loaded"
        );

        Ok(Self {
            project_root,
            environment: Arc::new(environment),
            flags,
            cwd: cwd.to_path_buf(),
            user: user.to_string(),
        })
    }

    pub fn services(&self, selector: &str) -> anyhow::Result<Vec<ServiceDeployment>> {
        Ok(semiont_config::resolve_services(&self.environment, selector)?)
    }

    /// An executor with every platform `deployments` need
    pub async fn executor(&self, deployments: &[ServiceDeployment]) -> anyhow::Result<Executor> {
        let platforms =
            PlatformSet::for_deployments(&self.project_root, &self.environment, deployments)
                .await?;
        Ok(self.executor_with(platforms))
    }

    pub fn executor_with(&self, platforms: PlatformSet) -> Executor {
        Executor::new(
            self.cwd.clone(),
            self.user.clone(),
            self.environment.clone(),
            platforms,
            self.flags,
        )
    }
}
