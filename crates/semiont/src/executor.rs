//! Sequential command execution over the selected services

use crate::platforms::PlatformSet;
use semiont_config::ServiceDeployment;
use semiont_core::{EnvironmentConfig, RuntimeFlags, ServiceContext, ServiceFactory, Verb};
use semiont_platform::{
    CommandResult, CommandResults, ExecutionContext, VerbOptions, dispatch,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// How a command walks its services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub verb: Verb,
    /// Walk services last-to-first so dependents go before dependencies
    pub reverse_order: bool,
    /// Keep going after a failed service
    pub continue_on_error: bool,
}

impl CommandDescriptor {
    pub const fn new(name: &'static str, verb: Verb) -> Self {
        Self {
            name,
            verb,
            reverse_order: false,
            continue_on_error: true,
        }
    }

    const fn reversed(mut self) -> Self {
        self.reverse_order = true;
        self
    }
}

pub const START: CommandDescriptor = CommandDescriptor::new("start", Verb::Start);
pub const STOP: CommandDescriptor = CommandDescriptor::new("stop", Verb::Stop).reversed();
pub const CHECK: CommandDescriptor = CommandDescriptor::new("check", Verb::Check);
pub const UPDATE: CommandDescriptor = CommandDescriptor::new("update", Verb::Update);
pub const PROVISION: CommandDescriptor = CommandDescriptor::new("provision", Verb::Provision);
pub const PUBLISH: CommandDescriptor = CommandDescriptor::new("publish", Verb::Publish);
pub const BACKUP: CommandDescriptor = CommandDescriptor::new("backup", Verb::Backup);
pub const RESTORE: CommandDescriptor = CommandDescriptor::new("restore", Verb::Restore);
pub const TEST: CommandDescriptor = CommandDescriptor::new("test", Verb::Test);
pub const EXEC: CommandDescriptor = CommandDescriptor::new("exec", Verb::Exec);

/// Runs one verb over a list of services, one at a time
pub struct Executor {
    /// Working directory of the invocation
    cwd: PathBuf,
    user: String,
    environment: Arc<EnvironmentConfig>,
    platforms: PlatformSet,
    flags: RuntimeFlags,
}

impl Executor {
    pub fn new(
        cwd: PathBuf,
        user: impl Into<String>,
        environment: Arc<EnvironmentConfig>,
        platforms: PlatformSet,
        flags: RuntimeFlags,
    ) -> Self {
        Self {
            cwd,
            user: user.into(),
            environment,
            platforms,
            flags,
        }
    }

    pub fn environment(&self) -> &EnvironmentConfig {
        &self.environment
    }

    pub async fn execute(
        &self,
        descriptor: &CommandDescriptor,
        deployments: &[ServiceDeployment],
        options: &VerbOptions,
    ) -> CommandResults {
        let started = Instant::now();
        let results = self.run(descriptor, deployments, options).await;
        CommandResults::new(
            descriptor.name,
            &self.environment.name,
            results,
            started.elapsed(),
            self.execution_context(),
        )
    }

    /// Per-service results of `descriptor`, in execution order
    pub async fn run(
        &self,
        descriptor: &CommandDescriptor,
        deployments: &[ServiceDeployment],
        options: &VerbOptions,
    ) -> Vec<CommandResult> {
        let ordered: Vec<&ServiceDeployment> = if descriptor.reverse_order {
            deployments.iter().rev().collect()
        } else {
            deployments.iter().collect()
        };
        info!(
            command = descriptor.name,
            environment = %self.environment.name,
            services = ordered.len(),
            "Executing"
        );

        let mut results = Vec::with_capacity(ordered.len());
        for deployment in ordered {
            let result = self.run_one(descriptor.verb, deployment, options).await;
            let failed = !result.success;
            results.push(result);
            if failed && !descriptor.continue_on_error {
                debug!(service = %deployment.name, "Stopping after failure");
                break;
            }
        }
        results
    }

    async fn run_one(
        &self,
        verb: Verb,
        deployment: &ServiceDeployment,
        options: &VerbOptions,
    ) -> CommandResult {
        let Some(platform) = self.platforms.get(deployment.platform) else {
            return CommandResult::failure(
                &deployment.name,
                deployment.platform,
                verb,
                format!("Platform '{}' is not available", deployment.platform),
            );
        };

        let service = ServiceFactory::create(
            &deployment.name,
            deployment.platform,
            &deployment.config,
            self.environment.clone(),
            self.flags,
            None,
        );
        let ctx = ServiceContext::new(service.as_ref());
        dispatch(platform.as_ref(), &self.platforms.registry, verb, &ctx, options).await
    }

    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext {
            user: self.user.clone(),
            cwd: self.cwd.display().to_string(),
            dry_run: self.flags.dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors() {
        assert!(STOP.reverse_order);
        assert!(!START.reverse_order);
        assert!(
            [START, STOP, CHECK, UPDATE, PROVISION, PUBLISH, BACKUP, RESTORE, TEST, EXEC]
                .iter()
                .all(|d| d.continue_on_error)
        );
        assert_eq!(EXEC.verb, Verb::Exec);
    }

    #[test]
    fn test_execution_context_reports_invocation() {
        let executor = Executor::new(
            PathBuf::from("/home/dev/project/apps"),
            "dev",
            Arc::new(EnvironmentConfig::default()),
            PlatformSet::new(),
            RuntimeFlags {
                dry_run: true,
                ..Default::default()
            },
        );
        let ctx = executor.execution_context();
        assert_eq!(ctx.user, "dev");
        assert_eq!(ctx.cwd, "/home/dev/project/apps");
        assert!(ctx.dry_run);
    }
}
