//! CloudFormation resource discovery
//!
//! Physical ids (ECS cluster and services, RDS instance, EFS file system,
//! load balancer DNS, WAF ACL) are read from stack outputs, with stack
//! resources as a fallback. Results are cached per service in its state
//! file for [`DISCOVERY_TTL_MS`].

use crate::error::DiscoveryError;
use async_trait::async_trait;
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use semiont_core::PlatformType;
use semiont_platform::{DISCOVERY_TTL_MS, ServiceState, StateManager, is_discovery_fresh};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Level, debug, warn};

pub const CLUSTER_NAME: &str = "clusterName";
pub const DB_INSTANCE_ID: &str = "dbInstanceId";
pub const FILE_SYSTEM_ID: &str = "fileSystemId";
pub const LOAD_BALANCER_DNS: &str = "loadBalancerDns";
pub const LOAD_BALANCER_ARN: &str = "loadBalancerArn";
pub const WAF_ACL_ARN: &str = "wafAclArn";

/// Discovered ids keyed by the constants above and [`service_key`]
pub type DiscoveredResources = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct StackResource {
    pub logical_id: String,
    pub resource_type: String,
    pub physical_id: Option<String>,
}

/// Read access to CloudFormation stacks
#[async_trait]
pub trait StackSource: Send + Sync {
    async fn outputs(&self, stack: &str) -> Result<BTreeMap<String, String>, DiscoveryError>;

    async fn resources(&self, stack: &str) -> Result<Vec<StackResource>, DiscoveryError>;
}

/// [`StackSource`] backed by the CloudFormation API
pub struct CloudFormationSource {
    client: aws_sdk_cloudformation::Client,
}

impl CloudFormationSource {
    pub fn new(client: aws_sdk_cloudformation::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StackSource for CloudFormationSource {
    async fn outputs(&self, stack: &str) -> Result<BTreeMap<String, String>, DiscoveryError> {
        debug!("Running: cloudformation describe-stacks --stack-name {}", stack);
        let response = self
            .client
            .describe_stacks()
            .stack_name(stack)
            .send()
            .await
            .map_err(|e| DiscoveryError::classify(stack, e.code(), e.message()))?;

        let found = response
            .stacks()
            .first()
            .ok_or_else(|| DiscoveryError::NotFound(stack.to_string()))?;
        Ok(found
            .outputs()
            .iter()
            .filter_map(|o| Some((o.output_key()?.to_string(), o.output_value()?.to_string())))
            .collect())
    }

    async fn resources(&self, stack: &str) -> Result<Vec<StackResource>, DiscoveryError> {
        debug!("Running: cloudformation list-stack-resources --stack-name {}", stack);
        let response = self
            .client
            .list_stack_resources()
            .stack_name(stack)
            .send()
            .await
            .map_err(|e| DiscoveryError::classify(stack, e.code(), e.message()))?;

        response
            .stack_resource_summaries()
            .iter()
            .map(|summary| {
                let logical: Option<&str> = summary.logical_resource_id().into();
                let kind: Option<&str> = summary.resource_type().into();
                match (logical, kind) {
                    (Some(logical), Some(kind)) => Ok(StackResource {
                        logical_id: logical.to_string(),
                        resource_type: kind.to_string(),
                        physical_id: summary.physical_resource_id().map(str::to_string),
                    }),
                    _ => Err(DiscoveryError::Malformed(format!(
                        "resource summary without id or type in {}",
                        stack
                    ))),
                }
            })
            .collect()
    }
}

/// Discovery key for an ECS service: `my-worker` → `myWorkerServiceName`
pub fn service_key(service: &str) -> String {
    let mut key = String::new();
    for (i, part) in service.split(['-', '_']).filter(|p| !p.is_empty()).enumerate() {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                key.extend(first.to_lowercase());
            } else {
                key.extend(first.to_uppercase());
            }
            key.push_str(chars.as_str());
        }
    }
    key.push_str("ServiceName");
    key
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Map a stack output key to its discovery key
pub fn classify_output(key: &str) -> Option<String> {
    let lower = key.to_lowercase();
    if key.ends_with("ServiceName") && key.len() > "ServiceName".len() {
        Some(lower_first(key))
    } else if lower.contains("clustername") {
        Some(CLUSTER_NAME.to_string())
    } else if (lower.contains("database") || lower.contains("db") || lower.contains("rds"))
        && (lower.contains("identifier") || lower.contains("instanceid"))
    {
        Some(DB_INSTANCE_ID.to_string())
    } else if lower.contains("filesystemid") || lower.contains("efsid") {
        Some(FILE_SYSTEM_ID.to_string())
    } else if (lower.contains("loadbalancer") || lower.contains("alb")) && lower.contains("dns") {
        Some(LOAD_BALANCER_DNS.to_string())
    } else if (lower.contains("webacl") || lower.contains("waf")) && lower.ends_with("arn") {
        Some(WAF_ACL_ARN.to_string())
    } else {
        None
    }
}

/// Map a stack resource to its discovery key and value
pub fn classify_resource(resource: &StackResource) -> Option<(String, String)> {
    let physical = resource.physical_id.clone()?;
    let key = match resource.resource_type.as_str() {
        "AWS::ECS::Cluster" => CLUSTER_NAME.to_string(),
        "AWS::ECS::Service" => {
            let prefix = resource
                .logical_id
                .split("Service")
                .next()
                .filter(|p| !p.is_empty())?;
            // physical id is the service ARN: arn:aws:ecs:...:service/<cluster>/<name>
            let name = physical.rsplit('/').next().unwrap_or(&physical).to_string();
            return Some((format!("{}ServiceName", lower_first(prefix)), name));
        }
        "AWS::RDS::DBInstance" => DB_INSTANCE_ID.to_string(),
        "AWS::EFS::FileSystem" => FILE_SYSTEM_ID.to_string(),
        "AWS::ElasticLoadBalancingV2::LoadBalancer" => LOAD_BALANCER_ARN.to_string(),
        "AWS::WAFv2::WebACL" => WAF_ACL_ARN.to_string(),
        _ => return None,
    };
    Some((key, physical))
}

fn skipped(stack: &str, what: &str, err: &DiscoveryError) {
    if err.log_level() == Level::WARN {
        warn!("Discovery of {} in {} failed: {}", what, stack, err);
    } else {
        debug!("Skipping {} of {}: {}", what, stack, err);
    }
}

/// One best-effort pass over `stacks`; failures only shrink the result
pub async fn discover(source: &dyn StackSource, stacks: &[String]) -> DiscoveredResources {
    let mut found = DiscoveredResources::new();
    for stack in stacks {
        match source.outputs(stack).await {
            Ok(outputs) => {
                for (key, value) in outputs {
                    if let Some(name) = classify_output(&key) {
                        found.insert(name, value);
                    }
                }
            }
            Err(e) => skipped(stack, "outputs", &e),
        }
        match source.resources(stack).await {
            Ok(resources) => {
                for (key, value) in resources.iter().filter_map(classify_resource) {
                    found.entry(key).or_insert(value);
                }
            }
            Err(e) => skipped(stack, "resources", &e),
        }
    }
    debug!("Discovered {} resources in {:?}", found.len(), stacks);
    found
}

/// Discovery fronted by the per-service state-file cache
pub struct Discovery {
    source: Arc<dyn StackSource>,
    state: StateManager,
    environment: String,
}

impl Discovery {
    pub fn new(source: Arc<dyn StackSource>, state: StateManager, environment: &str) -> Self {
        Self {
            source,
            state,
            environment: environment.to_string(),
        }
    }

    /// Cached resources for `service` when fresh, else a new discovery pass
    pub async fn resources(
        &self,
        service: &str,
        stacks: &[String],
        force: bool,
    ) -> DiscoveredResources {
        self.resources_at(service, stacks, force, chrono::Utc::now().timestamp_millis())
            .await
    }

    pub async fn resources_at(
        &self,
        service: &str,
        stacks: &[String],
        force: bool,
        now_ms: i64,
    ) -> DiscoveredResources {
        let cached = self.state.load_or_default(&self.environment, service).await;
        if is_discovery_fresh(cached.as_ref(), now_ms, force) {
            if let Some(resources) = cached.as_ref().and_then(|s| s.cfn_resources.clone()) {
                debug!(service, "Using cached discovery (ttl {} ms)", DISCOVERY_TTL_MS);
                return resources;
            }
        }

        let resources = discover(self.source.as_ref(), stacks).await;
        let mut state = cached
            .unwrap_or_else(|| ServiceState::new(service, PlatformType::Aws, &self.environment));
        state.set_discovery(resources.clone(), now_ms);
        if let Err(e) = self.state.save(&state).await {
            warn!("Could not cache discovery for {}: {}", service, e);
        }
        resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and serves a fixed app stack
    #[derive(Default)]
    struct SpySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StackSource for SpySource {
        async fn outputs(&self, stack: &str) -> Result<BTreeMap<String, String>, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match stack {
                "AppStack" => Ok(BTreeMap::from([
                    ("ClusterName".to_string(), "semiont-cluster".to_string()),
                    ("BackendServiceName".to_string(), "semiont-backend".to_string()),
                    ("LoadBalancerDNS".to_string(), "alb-123.elb.amazonaws.com".to_string()),
                    ("Unrelated".to_string(), "x".to_string()),
                ])),
                "DeniedStack" => Err(DiscoveryError::AccessDenied("AccessDenied".into())),
                other => Err(DiscoveryError::NotFound(other.to_string())),
            }
        }

        async fn resources(&self, stack: &str) -> Result<Vec<StackResource>, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match stack {
                "AppStack" => Ok(vec![
                    StackResource {
                        logical_id: "FrontendService4A2B".into(),
                        resource_type: "AWS::ECS::Service".into(),
                        physical_id: Some(
                            "arn:aws:ecs:us-east-2:123:service/semiont-cluster/semiont-frontend"
                                .into(),
                        ),
                    },
                    StackResource {
                        logical_id: "Cluster".into(),
                        resource_type: "AWS::ECS::Cluster".into(),
                        physical_id: Some("ignored-because-output-wins".into()),
                    },
                ]),
                _ => Err(DiscoveryError::Api("Throttling".into())),
            }
        }
    }

    fn stacks(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_service_key() {
        assert_eq!(service_key("backend"), "backendServiceName");
        assert_eq!(service_key("my-worker"), "myWorkerServiceName");
    }

    #[test]
    fn test_classify_output() {
        assert_eq!(classify_output("BackendServiceName").as_deref(), Some("backendServiceName"));
        assert_eq!(classify_output("ClusterName").as_deref(), Some(CLUSTER_NAME));
        assert_eq!(classify_output("DatabaseIdentifier").as_deref(), Some(DB_INSTANCE_ID));
        assert_eq!(classify_output("EfsFileSystemId").as_deref(), Some(FILE_SYSTEM_ID));
        assert_eq!(classify_output("AlbDnsName").as_deref(), Some(LOAD_BALANCER_DNS));
        assert_eq!(classify_output("WebAclArn").as_deref(), Some(WAF_ACL_ARN));
        assert_eq!(classify_output("ServiceName"), None);
        assert_eq!(classify_output("SiteUrl"), None);
    }

    #[tokio::test]
    async fn test_discover_is_best_effort() {
        let source = SpySource::default();
        let found = discover(&source, &stacks(&["MissingStack", "DeniedStack", "AppStack"])).await;

        assert_eq!(found[CLUSTER_NAME], "semiont-cluster");
        assert_eq!(found["backendServiceName"], "semiont-backend");
        assert_eq!(found["frontendServiceName"], "semiont-frontend");
        assert_eq!(found[LOAD_BALANCER_DNS], "alb-123.elb.amazonaws.com");
        assert!(!found.contains_key("unrelated"));
    }

    #[tokio::test]
    async fn test_cache_avoids_second_query() {
        let dir = tempfile::tempdir().unwrap();
        let spy = Arc::new(SpySource::default());
        let discovery = Discovery::new(spy.clone(), StateManager::new(dir.path()), "production");
        let app = stacks(&["AppStack"]);
        let t0 = 1_700_000_000_000;

        let first = discovery.resources_at("backend", &app, false, t0).await;
        let calls = spy.calls.load(Ordering::SeqCst);
        assert_eq!(calls, 2);

        let second = discovery.resources_at("backend", &app, false, t0 + 60_000).await;
        assert_eq!(first, second);
        assert_eq!(spy.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_force_and_expiry_requery() {
        let dir = tempfile::tempdir().unwrap();
        let spy = Arc::new(SpySource::default());
        let discovery = Discovery::new(spy.clone(), StateManager::new(dir.path()), "production");
        let app = stacks(&["AppStack"]);
        let t0 = 1_700_000_000_000;

        discovery.resources_at("backend", &app, false, t0).await;
        discovery.resources_at("backend", &app, true, t0 + 1).await;
        assert_eq!(spy.calls.load(Ordering::SeqCst), 4);

        discovery
            .resources_at("backend", &app, false, t0 + 1 + DISCOVERY_TTL_MS)
            .await;
        assert_eq!(spy.calls.load(Ordering::SeqCst), 6);
    }
}
