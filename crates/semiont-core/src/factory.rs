//! Service construction
//!
//! The name of a service selects its variant; unknown names become a
//! [`GenericService`] driven entirely by configuration.

use crate::model::{EnvironmentConfig, PlatformType, ServiceConfig};
use crate::service::{
    AgentService, BackendService, DatabaseService, FilesystemService, FrontendService,
    GenericService, McpService, RuntimeFlags, Service, ServiceBase, ServiceKind,
};
use std::sync::Arc;

pub struct ServiceFactory;

impl ServiceFactory {
    /// Build the service variant for `name`, bound to `platform`
    ///
    /// `overrides` is layered onto `config` first; any field it sets wins.
    pub fn create(
        name: &str,
        platform: PlatformType,
        config: &ServiceConfig,
        environment: Arc<EnvironmentConfig>,
        flags: RuntimeFlags,
        overrides: Option<&ServiceConfig>,
    ) -> Box<dyn Service> {
        let config = match overrides {
            Some(o) => apply_overrides(config.clone(), o),
            None => config.clone(),
        };
        let base = ServiceBase::new(name, platform, config, environment, flags);
        let kind = ServiceKind::from_name(name);
        tracing::debug!(service = name, %platform, %kind, "Creating service");

        match kind {
            ServiceKind::Backend => Box::new(BackendService::new(base)),
            ServiceKind::Frontend => Box::new(FrontendService::new(base)),
            ServiceKind::Database => Box::new(DatabaseService::new(base)),
            ServiceKind::Filesystem => Box::new(FilesystemService::new(base)),
            ServiceKind::Agent => Box::new(AgentService::new(base)),
            ServiceKind::Mcp => Box::new(McpService::new(base)),
            ServiceKind::Generic => Box::new(GenericService::new(base)),
        }
    }
}

fn apply_overrides(mut config: ServiceConfig, o: &ServiceConfig) -> ServiceConfig {
    macro_rules! take {
        ($($field:ident),*) => {
            $(if o.$field.is_some() { config.$field = o.$field.clone(); })*
        };
    }
    take!(
        platform,
        service_type,
        port,
        command,
        image,
        health_check,
        path,
        cpu,
        memory,
        replicas,
        dockerfile,
        build_context,
        build_command,
        test_command,
        volume,
        mount_path,
        storage_size,
        public_url
    );
    config.environment.extend(o.environment.clone());
    if !o.depends_on.is_empty() {
        config.depends_on = o.depends_on.clone();
    }
    if !o.secrets.is_empty() {
        config.secrets = o.secrets.clone();
    }
    config.extra.extend(o.extra.clone());
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Arc<EnvironmentConfig> {
        Arc::new(EnvironmentConfig {
            name: "staging".into(),
            ..Default::default()
        })
    }

    #[test]
    fn test_known_names_map_to_variants() {
        for (name, kind) in [
            ("backend", ServiceKind::Backend),
            ("frontend", ServiceKind::Frontend),
            ("database", ServiceKind::Database),
            ("filesystem", ServiceKind::Filesystem),
            ("agent", ServiceKind::Agent),
            ("mcp", ServiceKind::Mcp),
        ] {
            let svc = ServiceFactory::create(
                name,
                PlatformType::Mock,
                &ServiceConfig::default(),
                env(),
                RuntimeFlags::default(),
                None,
            );
            assert_eq!(svc.kind(), kind);
            assert_eq!(svc.name(), name);
            assert_eq!(svc.environment_name(), "staging");
        }
    }

    #[test]
    fn test_unknown_name_is_generic() {
        let svc = ServiceFactory::create(
            "graph-sync",
            PlatformType::Process,
            &ServiceConfig::default(),
            env(),
            RuntimeFlags::default(),
            None,
        );
        assert_eq!(svc.kind(), ServiceKind::Generic);
        assert_eq!(svc.platform(), PlatformType::Process);
    }

    #[test]
    fn test_overrides_win() {
        let config = ServiceConfig {
            port: Some(4000),
            command: Some("npm start".into()),
            ..Default::default()
        };
        let overrides = ServiceConfig {
            port: Some(4500),
            ..Default::default()
        };
        let flags = RuntimeFlags {
            dry_run: true,
            ..Default::default()
        };
        let svc = ServiceFactory::create(
            "backend",
            PlatformType::Container,
            &config,
            env(),
            flags,
            Some(&overrides),
        );
        assert_eq!(svc.port(), Some(4500));
        assert_eq!(svc.command().unwrap(), "npm start");
        assert!(svc.flags().dry_run);
    }
}
