//! Service-type specific verb handlers
//!
//! A platform's verb methods handle the common case. When one service type
//! needs different treatment (a graph database whose health is checked over
//! TCP rather than HTTP, say) a handler is registered for
//! `(platform, verb, service type)` and [`dispatch`] prefers it.

use crate::error::Result;
use crate::result::CommandResult;
use crate::strategy::{PlatformStrategy, VerbOptions};
use async_trait::async_trait;
use semiont_core::{PlatformType, ServiceContext, Verb};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: &ServiceContext<'_>, options: &VerbOptions) -> Result<CommandResult>;
}

type HandlerKey = (PlatformType, Verb, String);

#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<HandlerKey, Arc<dyn CommandHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`; a later registration for the same key replaces it
    pub fn register(
        &mut self,
        platform: PlatformType,
        verb: Verb,
        service_type: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) {
        let service_type = service_type.into();
        debug!(%platform, %verb, service_type, "Registering handler");
        self.handlers.insert((platform, verb, service_type), handler);
    }

    pub fn get(
        &self,
        platform: PlatformType,
        verb: Verb,
        service_type: &str,
    ) -> Option<Arc<dyn CommandHandler>> {
        self.handlers
            .get(&(platform, verb, service_type.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self
            .handlers
            .keys()
            .map(|(p, v, t)| format!("{}/{}/{}", p, v, t))
            .collect();
        keys.sort();
        f.debug_struct("HandlerRegistry").field("handlers", &keys).finish()
    }
}

/// Apply `verb` to one service
///
/// Never fails: platform errors, hook errors and configuration errors all
/// come back as a result with `success: false`. Mutating verbs are skipped
/// under `--dry-run`. Lifecycle hooks run around `start` and `stop`.
#[tracing::instrument(skip_all, fields(service = ctx.name(), %verb))]
pub async fn dispatch(
    platform: &dyn PlatformStrategy,
    registry: &HandlerRegistry,
    verb: Verb,
    ctx: &ServiceContext<'_>,
    options: &VerbOptions,
) -> CommandResult {
    let platform_type = platform.platform_type();

    if ctx.flags().dry_run && verb.is_mutating() {
        info!("Dry run, skipping");
        return CommandResult::dry_run(ctx.name(), platform_type, verb);
    }

    match run_with_hooks(platform, registry, verb, ctx, options).await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "Verb failed");
            CommandResult::failure(ctx.name(), platform_type, verb, e.to_string())
        }
    }
}

async fn run_with_hooks(
    platform: &dyn PlatformStrategy,
    registry: &HandlerRegistry,
    verb: Verb,
    ctx: &ServiceContext<'_>,
    options: &VerbOptions,
) -> Result<CommandResult> {
    let service = ctx.service;
    match verb {
        Verb::Start => service.pre_start().await?,
        Verb::Stop => service.pre_stop().await?,
        _ => {}
    }

    let service_type = service.service_type();
    let result = match registry.get(platform.platform_type(), verb, service_type) {
        Some(handler) => {
            debug!(service_type, "Using registered handler");
            handler.handle(ctx, options).await?
        }
        None => platform.run(verb, ctx, options).await?,
    };

    if result.success {
        match verb {
            Verb::Start => service.post_start().await?,
            Verb::Stop => service.post_stop().await?,
            _ => {}
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPlatform;
    use crate::result::{CheckDetails, ServiceStatus, VerbDetails};
    use semiont_core::{EnvironmentConfig, RuntimeFlags, ServiceConfig, ServiceFactory};

    struct FixedCheck;

    #[async_trait]
    impl CommandHandler for FixedCheck {
        async fn handle(
            &self,
            ctx: &ServiceContext<'_>,
            _options: &VerbOptions,
        ) -> Result<CommandResult> {
            Ok(CommandResult::success(
                ctx.name(),
                PlatformType::Mock,
                VerbDetails::Check(CheckDetails {
                    status: ServiceStatus::Unhealthy,
                    state_verified: true,
                    health: None,
                    resources: None,
                    logs: None,
                }),
            )
            .with_metadata("handler", "fixed"))
        }
    }

    fn service(name: &str, service_type: Option<&str>, flags: RuntimeFlags) -> Box<dyn semiont_core::Service> {
        let config = ServiceConfig {
            service_type: service_type.map(str::to_string),
            command: Some("run".into()),
            ..Default::default()
        };
        ServiceFactory::create(
            name,
            PlatformType::Mock,
            &config,
            std::sync::Arc::new(EnvironmentConfig {
                name: "test".into(),
                ..Default::default()
            }),
            flags,
            None,
        )
    }

    #[tokio::test]
    async fn test_registered_handler_wins() {
        let mut registry = HandlerRegistry::new();
        registry.register(PlatformType::Mock, Verb::Check, "janusgraph", Arc::new(FixedCheck));

        let platform = MockPlatform::new();
        let svc = service("database", Some("janusgraph"), RuntimeFlags::default());
        let ctx = ServiceContext::new(svc.as_ref());
        let result = dispatch(&platform, &registry, Verb::Check, &ctx, &VerbOptions::default()).await;

        assert_eq!(result.metadata["handler"], "fixed");
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_platform() {
        let mut registry = HandlerRegistry::new();
        registry.register(PlatformType::Mock, Verb::Check, "janusgraph", Arc::new(FixedCheck));

        let platform = MockPlatform::new();
        let svc = service("database", Some("postgres"), RuntimeFlags::default());
        let ctx = ServiceContext::new(svc.as_ref());
        let result = dispatch(&platform, &registry, Verb::Check, &ctx, &VerbOptions::default()).await;

        assert!(result.metadata.get("handler").is_none());
        assert_eq!(platform.calls(), vec![(Verb::Check, "database".to_string())]);
    }

    #[tokio::test]
    async fn test_error_becomes_failed_result() {
        let platform = MockPlatform::new();
        platform.fail_on(Verb::Start, "backend");
        let svc = service("backend", None, RuntimeFlags::default());
        let ctx = ServiceContext::new(svc.as_ref());
        let result = dispatch(
            &platform,
            &HandlerRegistry::new(),
            Verb::Start,
            &ctx,
            &VerbOptions::default(),
        )
        .await;

        assert!(!result.success);
        assert!(!result.error.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_skips_mutations_only() {
        let platform = MockPlatform::new();
        let flags = RuntimeFlags {
            dry_run: true,
            ..Default::default()
        };
        let svc = service("backend", None, flags);
        let ctx = ServiceContext::new(svc.as_ref());
        let registry = HandlerRegistry::new();

        let start = dispatch(&platform, &registry, Verb::Start, &ctx, &VerbOptions::default()).await;
        assert!(start.success);
        assert_eq!(start.metadata["dryRun"], true);

        dispatch(&platform, &registry, Verb::Check, &ctx, &VerbOptions::default()).await;
        assert_eq!(platform.calls(), vec![(Verb::Check, "backend".to_string())]);
    }
}
