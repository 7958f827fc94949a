//! Platform strategy trait definition

use crate::error::Result;
use crate::result::CommandResult;
use crate::secrets::{SecretAction, SecretOutcome};
use async_trait::async_trait;
use semiont_core::{PlatformType, ServiceContext, Verb};
use serde::{Deserialize, Serialize};

/// Verb-specific flags from the command line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerbOptions {
    pub force: bool,
    /// Seconds to wait for the verb to settle
    pub timeout: Option<u64>,
    /// Image tag or version for publish/update
    pub tag: Option<String>,
    pub backup_id: Option<String>,
    pub test_suite: Option<String>,
    pub exec_command: Option<String>,
    /// Stack to provision, or the instance a restore lands in
    pub target: Option<String>,
}

/// A deployment target that realises service requirements
///
/// Every platform (process, container, aws, mock) implements one method per
/// verb. Methods return `Err` for platform failures; [`crate::dispatch`]
/// converts those into failed results so a command keeps going with the
/// next service.
#[async_trait]
pub trait PlatformStrategy: Send + Sync {
    fn platform_type(&self) -> PlatformType;

    async fn start(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult>;

    async fn stop(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult>;

    /// Read live state. Must not mutate anything on the platform.
    async fn check(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult>;

    async fn update(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult>;

    async fn provision(
        &self,
        ctx: &ServiceContext<'_>,
        options: &VerbOptions,
    ) -> Result<CommandResult>;

    async fn publish(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult>;

    async fn backup(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult>;

    async fn restore(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult>;

    async fn test(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult>;

    async fn exec(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult>;

    /// Uniform get/set/list/delete over the platform's secret store
    async fn manage_secret(
        &self,
        action: SecretAction,
        path: &str,
        value: Option<&str>,
    ) -> Result<SecretOutcome>;

    /// Run `verb` through the matching method
    async fn run(
        &self,
        verb: Verb,
        ctx: &ServiceContext<'_>,
        options: &VerbOptions,
    ) -> Result<CommandResult> {
        match verb {
            Verb::Start => self.start(ctx, options).await,
            Verb::Stop => self.stop(ctx, options).await,
            Verb::Check => self.check(ctx, options).await,
            Verb::Update => self.update(ctx, options).await,
            Verb::Provision => self.provision(ctx, options).await,
            Verb::Publish => self.publish(ctx, options).await,
            Verb::Backup => self.backup(ctx, options).await,
            Verb::Restore => self.restore(ctx, options).await,
            Verb::Test => self.test(ctx, options).await,
            Verb::Exec => self.exec(ctx, options).await,
        }
    }
}
