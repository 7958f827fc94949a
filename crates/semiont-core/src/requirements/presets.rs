//! Common requirement shapes that service variants start from

use super::{
    NetworkRequirements, ResourceRequirements, SecurityRequirements, ServiceRequirements,
    StorageRequirement,
};

/// HTTP service behind a load balancer, no local state
pub fn stateless_web(port: u16, health_path: &str) -> ServiceRequirements {
    ServiceRequirements::new()
        .with_network(NetworkRequirements {
            ports: vec![port],
            needs_load_balancer: true,
            health_check_path: Some(health_path.to_string()),
            health_check_port: Some(port),
            health_check_interval: Some(30),
            ..Default::default()
        })
        .with_resources(ResourceRequirements {
            cpu: Some("0.5".into()),
            memory: Some("512Mi".into()),
            replicas: Some(1),
            ..Default::default()
        })
        .with_security(SecurityRequirements {
            run_as_non_root: true,
            ..Default::default()
        })
}

/// Single-replica stateful server with a backed-up volume
pub fn database(port: u16, volume: &str) -> ServiceRequirements {
    ServiceRequirements::new()
        .with_network(NetworkRequirements {
            ports: vec![port],
            ..Default::default()
        })
        .with_storage(vec![StorageRequirement {
            persistent: true,
            volume_name: Some(volume.to_string()),
            size: Some("10Gi".into()),
            mount_path: Some("/var/lib/data".into()),
            backup: true,
        }])
        .with_resources(ResourceRequirements {
            cpu: Some("1".into()),
            memory: Some("1Gi".into()),
            replicas: Some(1),
            ..Default::default()
        })
}

/// Shared persistent storage with no network surface
pub fn storage(volume: &str, mount_path: &str) -> ServiceRequirements {
    ServiceRequirements::new().with_storage(vec![StorageRequirement {
        persistent: true,
        volume_name: Some(volume.to_string()),
        mount_path: Some(mount_path.to_string()),
        backup: true,
        ..Default::default()
    }])
}

/// Background worker, no ports
pub fn worker() -> ServiceRequirements {
    ServiceRequirements::new().with_resources(ResourceRequirements {
        cpu: Some("0.25".into()),
        memory: Some("256Mi".into()),
        replicas: Some(1),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stateless_web() {
        let reqs = stateless_web(3000, "/api/health");
        let network = reqs.network.unwrap();
        assert_eq!(network.ports, vec![3000]);
        assert!(network.needs_load_balancer);
        assert!(reqs.storage.is_none());
    }

    #[test]
    fn test_database_has_backed_up_volume() {
        let reqs = database(5432, "pgdata");
        let volume = reqs.persistent_storage().next().unwrap();
        assert!(volume.backup);
        assert_eq!(volume.volume_name.as_deref(), Some("pgdata"));
    }

    #[test]
    fn test_worker_has_no_network() {
        assert!(worker().network.is_none());
    }
}
