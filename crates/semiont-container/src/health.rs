//! Health checks for graph databases in containers
//!
//! Each engine is checked its own way: JanusGraph by opening its Gremlin
//! TCP port, Neo4j by the HTTP status of its browser endpoint, ArangoDB by
//! looking for `arangod` in the container's process list. They are
//! registered as `check` handlers keyed by the database `type`.

use crate::platform::{Observed, container_name, observe};
use crate::runtime::ContainerRuntime;
use async_trait::async_trait;
use semiont_core::{HealthReport, PlatformType, ServiceContext, Verb};
use semiont_platform::{
    CheckDetails, CommandHandler, CommandResult, HandlerRegistry, PlatformResources,
    ServiceStatus, VerbDetails, VerbOptions,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

pub fn register_health_checks(registry: &mut HandlerRegistry, runtime: Arc<ContainerRuntime>) {
    registry.register(
        PlatformType::Container,
        Verb::Check,
        "janusgraph",
        Arc::new(JanusGraphCheck {
            runtime: runtime.clone(),
        }),
    );
    registry.register(
        PlatformType::Container,
        Verb::Check,
        "neo4j",
        Arc::new(Neo4jCheck {
            runtime: runtime.clone(),
        }),
    );
    registry.register(
        PlatformType::Container,
        Verb::Check,
        "arangodb",
        Arc::new(ArangoCheck { runtime }),
    );
}

fn port_or(ctx: &ServiceContext<'_>, default: u16) -> u16 {
    ctx.requirements.ports().first().copied().unwrap_or(default)
}

/// Build the check result once the container state and check are known
fn check_result(
    ctx: &ServiceContext<'_>,
    observed: &Observed,
    health: Option<HealthReport>,
) -> CommandResult {
    let name = container_name(ctx.name(), ctx.environment_name());
    let (status, resources) = match observed {
        Observed::Missing => (ServiceStatus::Stopped, None),
        Observed::Unparseable(_) => (ServiceStatus::Unknown, None),
        Observed::State(state) => {
            let status = match (&health, state.is_running()) {
                (_, false) => ServiceStatus::Stopped,
                (Some(h), true) if !h.healthy => ServiceStatus::Unhealthy,
                (_, true) => ServiceStatus::Running,
            };
            let resources = PlatformResources::Container {
                container_name: name,
                container_id: Some(state.id.clone()),
                image: ctx.service.image(),
                ports: Default::default(),
            };
            (status, Some(resources))
        }
    };

    let result = CommandResult::success(
        ctx.name(),
        PlatformType::Container,
        VerbDetails::Check(CheckDetails {
            status,
            state_verified: !matches!(observed, Observed::Unparseable(_)),
            health,
            resources,
            logs: None,
        }),
    );
    match observed {
        Observed::Unparseable(reason) => result.with_warning(reason.clone()),
        _ => result,
    }
}

pub struct JanusGraphCheck {
    runtime: Arc<ContainerRuntime>,
}

#[async_trait]
impl CommandHandler for JanusGraphCheck {
    async fn handle(
        &self,
        ctx: &ServiceContext<'_>,
        _options: &VerbOptions,
    ) -> semiont_platform::Result<CommandResult> {
        let observed = observe(&self.runtime, ctx).await?;
        let health = match &observed {
            Observed::State(s) if s.is_running() => Some(tcp_check(port_or(ctx, 8182)).await),
            _ => None,
        };
        Ok(check_result(ctx, &observed, health))
    }
}

pub async fn tcp_check(port: u16) -> HealthReport {
    let addr = format!("127.0.0.1:{}", port);
    match tokio::time::timeout(CHECK_TIMEOUT, TcpStream::connect(&addr)).await {
        Ok(Ok(_)) => HealthReport::healthy(json!({ "check": "tcp", "address": addr })),
        Ok(Err(e)) => HealthReport::unhealthy(json!({ "check": "tcp", "address": addr, "error": e.to_string() })),
        Err(_) => HealthReport::unhealthy(json!({ "check": "tcp", "address": addr, "error": "timeout" })),
    }
}

pub struct Neo4jCheck {
    runtime: Arc<ContainerRuntime>,
}

#[async_trait]
impl CommandHandler for Neo4jCheck {
    async fn handle(
        &self,
        ctx: &ServiceContext<'_>,
        _options: &VerbOptions,
    ) -> semiont_platform::Result<CommandResult> {
        let observed = observe(&self.runtime, ctx).await?;
        let health = match &observed {
            Observed::State(s) if s.is_running() => {
                Some(http_check(&format!("http://127.0.0.1:{}/", port_or(ctx, 7474))).await)
            }
            _ => None,
        };
        Ok(check_result(ctx, &observed, health))
    }
}

/// Healthy on any 2xx status
pub async fn http_check(url: &str) -> HealthReport {
    let client = match reqwest::Client::builder().timeout(CHECK_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => return HealthReport::unhealthy(json!({ "url": url, "error": e.to_string() })),
    };
    match client.get(url).send().await {
        Ok(response) => {
            let code = response.status().as_u16();
            let details = json!({ "check": "http", "url": url, "statusCode": code });
            if response.status().is_success() {
                HealthReport::healthy(details)
            } else {
                HealthReport::unhealthy(details)
            }
        }
        Err(e) => HealthReport::unhealthy(json!({ "check": "http", "url": url, "error": e.to_string() })),
    }
}

pub struct ArangoCheck {
    runtime: Arc<ContainerRuntime>,
}

#[async_trait]
impl CommandHandler for ArangoCheck {
    async fn handle(
        &self,
        ctx: &ServiceContext<'_>,
        _options: &VerbOptions,
    ) -> semiont_platform::Result<CommandResult> {
        let observed = observe(&self.runtime, ctx).await?;
        let health = match &observed {
            Observed::State(s) if s.is_running() => {
                let name = container_name(ctx.name(), ctx.environment_name());
                let ps = self
                    .runtime
                    .exec(&name, "ps aux")
                    .await
                    .map_err(semiont_platform::PlatformError::from)?;
                let listed = ps.success && crate::parse::process_listed(&ps.stdout, "arangod");
                let details = json!({ "check": "process", "process": "arangod", "found": listed });
                Some(if listed {
                    HealthReport::healthy(details)
                } else {
                    HealthReport::unhealthy(details)
                })
            }
            _ => None,
        };
        Ok(check_result(ctx, &observed, health))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_check_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(tcp_check(port).await.healthy);
    }

    #[tokio::test]
    async fn test_tcp_check_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let report = tcp_check(port).await;
        assert!(!report.healthy);
        assert!(report.details["error"].is_string());
    }

    #[tokio::test]
    async fn test_http_check_unreachable() {
        let report = http_check("http://127.0.0.1:9/").await;
        assert!(!report.healthy);
    }

    #[test]
    fn test_registration() {
        let mut registry = HandlerRegistry::new();
        register_health_checks(&mut registry, Arc::new(ContainerRuntime::new("docker")));
        assert_eq!(registry.len(), 3);
        assert!(registry.get(PlatformType::Container, Verb::Check, "neo4j").is_some());
        assert!(registry.get(PlatformType::Container, Verb::Check, "postgres").is_none());
        assert!(registry.get(PlatformType::Aws, Verb::Check, "neo4j").is_none());
    }
}
