use super::{HealthReport, Service, ServiceBase, ServiceKind};
use crate::requirements::{ServiceRequirements, merge_requirements, presets};
use async_trait::async_trait;
use serde_json::json;
use std::path::Path;

/// Shared document storage
#[derive(Debug)]
pub struct FilesystemService {
    base: ServiceBase,
}

impl FilesystemService {
    pub fn new(base: ServiceBase) -> Self {
        Self { base }
    }

    fn mount_path(&self) -> String {
        let config = self.config();
        config
            .mount_path
            .clone()
            .or_else(|| config.path.clone())
            .unwrap_or_else(|| "/data/uploads".to_string())
    }
}

#[async_trait]
impl Service for FilesystemService {
    fn base(&self) -> &ServiceBase {
        &self.base
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Filesystem
    }

    fn requirements(&self) -> ServiceRequirements {
        let volume = self
            .config()
            .volume
            .clone()
            .unwrap_or_else(|| format!("semiont-{}-{}", self.name(), self.environment_name()));
        let preset = presets::storage(&volume, &self.mount_path());

        let mut specific = ServiceRequirements::new().with_label("semiont.service", "filesystem");
        if let Some(size) = &self.config().storage_size {
            let mut storage = preset.storage.clone().unwrap_or_default();
            for s in &mut storage {
                s.size = Some(size.clone());
            }
            specific = specific.with_storage(storage);
        }

        merge_requirements(preset, specific)
    }

    /// Local check only: the configured path exists and is a directory
    async fn check_health(&self) -> Option<HealthReport> {
        let path = self.config().path.clone()?;
        let exists = Path::new(&path).is_dir();
        let details = json!({ "path": path, "exists": exists });
        Some(if exists {
            HealthReport::healthy(details)
        } else {
            HealthReport::unhealthy(details)
        })
    }
}
