use super::{Service, ServiceBase, ServiceKind, requirements_from_config};
use crate::requirements::ServiceRequirements;
use async_trait::async_trait;

/// Catch-all for names without a dedicated variant
///
/// Has no built-in defaults: requirements, command and port come only from
/// the service's configuration.
#[derive(Debug)]
pub struct GenericService {
    base: ServiceBase,
}

impl GenericService {
    pub fn new(base: ServiceBase) -> Self {
        Self { base }
    }
}

#[async_trait]
impl Service for GenericService {
    fn base(&self) -> &ServiceBase {
        &self.base
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Generic
    }

    fn requirements(&self) -> ServiceRequirements {
        requirements_from_config(self.config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServiceConfig;
    use crate::service::test_support::base;

    #[test]
    fn test_missing_command_message() {
        let svc = GenericService::new(base("worker-7", ServiceConfig::default()));
        let message = svc.command().unwrap_err().to_string();
        assert!(message.contains("worker-7"));
        assert!(message.contains("Add \"command\" to your service configuration"));
    }

    #[test]
    fn test_everything_from_config() {
        let config = ServiceConfig {
            command: Some("./run.sh".into()),
            port: Some(9000),
            ..Default::default()
        };
        let svc = GenericService::new(base("worker-7", config));
        assert_eq!(svc.command().unwrap(), "./run.sh");
        assert_eq!(svc.requirements().ports(), &[9000]);
        assert_eq!(svc.image(), "semiont-worker-7:latest");
        assert_eq!(svc.service_type(), "generic");
    }

    #[test]
    fn test_no_requirements_without_config() {
        let svc = GenericService::new(base("worker-7", ServiceConfig::default()));
        assert_eq!(svc.requirements(), ServiceRequirements::new());
        assert!(svc.port().is_none());
    }
}
