//! Lazily built SDK clients, one set per region

use aws_config::{BehaviorVersion, Region};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// SDK clients sharing one loaded configuration
#[derive(Debug, Clone)]
pub struct AwsClients {
    pub region: String,
    pub cloudformation: aws_sdk_cloudformation::Client,
    pub ecs: aws_sdk_ecs::Client,
    pub rds: aws_sdk_rds::Client,
    pub secrets: aws_sdk_secretsmanager::Client,
}

impl AwsClients {
    pub async fn load(region: &str, profile: Option<&str>) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;
        tracing::debug!(region, ?profile, "Loaded AWS SDK configuration");

        Self {
            region: region.to_string(),
            cloudformation: aws_sdk_cloudformation::Client::new(&config),
            ecs: aws_sdk_ecs::Client::new(&config),
            rds: aws_sdk_rds::Client::new(&config),
            secrets: aws_sdk_secretsmanager::Client::new(&config),
        }
    }
}

/// Region → client set, built on first use and reused for the process
#[derive(Debug, Default)]
pub struct ClientCache {
    profile: Option<String>,
    clients: Mutex<HashMap<String, Arc<AwsClients>>>,
}

impl ClientCache {
    pub fn new(profile: Option<String>) -> Self {
        Self {
            profile,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub async fn for_region(&self, region: &str) -> Arc<AwsClients> {
        let mut clients = self.clients.lock().await;
        if let Some(existing) = clients.get(region) {
            return existing.clone();
        }
        let created = Arc::new(AwsClients::load(region, self.profile.as_deref()).await);
        clients.insert(region.to_string(), created.clone());
        created
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }
}
