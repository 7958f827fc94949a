use super::{Service, ServiceBase, ServiceKind, resources_with};
use crate::requirements::{
    BuildRequirements, ServiceRequirements, StorageRequirement, merge_requirements, presets,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Engines with built-in defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseEngine {
    Postgres,
    Mysql,
    Mongodb,
    Janusgraph,
    Neo4j,
    Arangodb,
}

impl DatabaseEngine {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::Mysql),
            "mongodb" | "mongo" => Some(Self::Mongodb),
            "janusgraph" => Some(Self::Janusgraph),
            "neo4j" => Some(Self::Neo4j),
            "arangodb" | "arango" => Some(Self::Arangodb),
            _ => None,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::Mysql => 3306,
            Self::Mongodb => 27017,
            Self::Janusgraph => 8182,
            Self::Neo4j => 7474,
            Self::Arangodb => 8529,
        }
    }

    pub fn image(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres:15-alpine",
            Self::Mysql => "mysql:8",
            Self::Mongodb => "mongo:7",
            Self::Janusgraph => "janusgraph/janusgraph:1.0",
            Self::Neo4j => "neo4j:5",
            Self::Arangodb => "arangodb:3.11",
        }
    }

    pub fn data_dir(&self) -> &'static str {
        match self {
            Self::Postgres => "/var/lib/postgresql/data",
            Self::Mysql => "/var/lib/mysql",
            Self::Mongodb => "/data/db",
            Self::Janusgraph => "/var/lib/janusgraph",
            Self::Neo4j => "/data",
            Self::Arangodb => "/var/lib/arangodb3",
        }
    }
}

/// Stateful data store; `type` selects the engine (postgres by default)
#[derive(Debug)]
pub struct DatabaseService {
    base: ServiceBase,
}

impl DatabaseService {
    pub fn new(base: ServiceBase) -> Self {
        Self { base }
    }

    pub fn engine(&self) -> DatabaseEngine {
        self.config()
            .service_type
            .as_deref()
            .and_then(DatabaseEngine::parse)
            .unwrap_or(DatabaseEngine::Postgres)
    }

    fn volume_name(&self) -> String {
        self.config()
            .volume
            .clone()
            .unwrap_or_else(|| format!("semiont-{}-{}-data", self.name(), self.environment_name()))
    }
}

#[async_trait]
impl Service for DatabaseService {
    fn base(&self) -> &ServiceBase {
        &self.base
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Database
    }

    fn requirements(&self) -> ServiceRequirements {
        let engine = self.engine();
        let port = self.port().unwrap_or(engine.port());
        let preset = presets::database(port, &self.volume_name());
        let config = self.config();

        let specific = ServiceRequirements::new()
            .with_storage(vec![StorageRequirement {
                persistent: true,
                volume_name: Some(self.volume_name()),
                size: config.storage_size.clone().or_else(|| Some("10Gi".into())),
                mount_path: Some(
                    config
                        .mount_path
                        .clone()
                        .unwrap_or_else(|| engine.data_dir().to_string()),
                ),
                backup: true,
            }])
            .with_build(BuildRequirements {
                prebuilt: true,
                ..Default::default()
            })
            .with_resources(resources_with(preset.resources.clone(), config))
            .with_environment(self.environment_variables())
            .with_label("semiont.service", "database")
            .with_annotation("semiont/engine", format!("{:?}", engine).to_lowercase());

        merge_requirements(preset, specific)
    }

    fn default_port(&self) -> Option<u16> {
        Some(self.engine().port())
    }

    fn default_image(&self) -> Option<String> {
        Some(self.engine().image().to_string())
    }

    fn environment_variables(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        if self.engine() == DatabaseEngine::Postgres {
            vars.insert("POSTGRES_DB".to_string(), "semiont".to_string());
            vars.insert("POSTGRES_USER".to_string(), "semiont".to_string());
        }
        vars.extend(self.config().environment.clone());
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServiceConfig;
    use crate::service::test_support::base;

    #[test]
    fn test_postgres_defaults() {
        let svc = DatabaseService::new(base("database", ServiceConfig::default()));
        assert_eq!(svc.engine(), DatabaseEngine::Postgres);
        assert_eq!(svc.port(), Some(5432));
        assert_eq!(svc.image(), "postgres:15-alpine");

        let reqs = svc.requirements();
        let storage = reqs.storage.as_ref().unwrap();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage[0].mount_path.as_deref(), Some("/var/lib/postgresql/data"));
        assert_eq!(storage[0].volume_name.as_deref(), Some("semiont-database-test-data"));
        assert_eq!(reqs.annotation("semiont/engine"), Some("postgres"));
    }

    #[test]
    fn test_engine_from_type() {
        let config = ServiceConfig {
            service_type: Some("janusgraph".into()),
            ..Default::default()
        };
        let svc = DatabaseService::new(base("database", config));
        assert_eq!(svc.engine(), DatabaseEngine::Janusgraph);
        assert_eq!(svc.port(), Some(8182));
        assert_eq!(svc.service_type(), "janusgraph");
        assert!(!svc.environment_variables().contains_key("POSTGRES_DB"));
    }

    #[test]
    fn test_no_default_command() {
        let svc = DatabaseService::new(base("database", ServiceConfig::default()));
        assert!(svc.command().is_err());
    }
}
