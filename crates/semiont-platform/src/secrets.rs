//! Secret management contract and the on-disk store used by local platforms

use crate::error::{PlatformError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretAction {
    Get,
    Set,
    List,
    Delete,
}

impl fmt::Display for SecretAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretAction::Get => write!(f, "get"),
            SecretAction::Set => write!(f, "set"),
            SecretAction::List => write!(f, "list"),
            SecretAction::Delete => write!(f, "delete"),
        }
    }
}

impl FromStr for SecretAction {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "get" => Ok(SecretAction::Get),
            "set" => Ok(SecretAction::Set),
            "list" => Ok(SecretAction::List),
            "delete" => Ok(SecretAction::Delete),
            other => Err(PlatformError::InvalidConfig(format!(
                "Unknown secret action: {}",
                other
            ))),
        }
    }
}

/// Result of a secret operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretOutcome {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    /// False when a delete found nothing to remove
    pub changed: bool,
}

/// Apply `action` to an in-memory secret map
///
/// Shared by the file-backed store and the mock platform so both follow
/// the same rules: `get` of a missing path is an error, `list` filters by
/// prefix, `delete` of a missing path is not.
pub fn apply_secret_action(
    secrets: &mut BTreeMap<String, String>,
    action: SecretAction,
    path: &str,
    value: Option<&str>,
) -> Result<SecretOutcome> {
    let mut outcome = SecretOutcome {
        path: path.to_string(),
        ..Default::default()
    };
    match action {
        SecretAction::Get => {
            let value = secrets
                .get(path)
                .ok_or_else(|| PlatformError::SecretNotFound(path.to_string()))?;
            outcome.value = Some(value.clone());
        }
        SecretAction::Set => {
            let value = value.ok_or_else(|| {
                PlatformError::InvalidConfig(format!("No value given for secret {}", path))
            })?;
            secrets.insert(path.to_string(), value.to_string());
            outcome.changed = true;
        }
        SecretAction::List => {
            outcome.names = secrets
                .keys()
                .filter(|k| k.starts_with(path))
                .cloned()
                .collect();
        }
        SecretAction::Delete => {
            outcome.changed = secrets.remove(path).is_some();
        }
    }
    Ok(outcome)
}

/// JSON file of secrets at `.semiont/secrets/<env>.json`, mode 0600
#[derive(Debug, Clone)]
pub struct LocalSecretStore {
    path: PathBuf,
}

impl LocalSecretStore {
    pub fn new(project_root: &Path, environment: &str) -> Self {
        Self {
            path: project_root
                .join(".semiont/secrets")
                .join(format!("{}.json", environment)),
        }
    }

    async fn read(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn write(&self, secrets: &BTreeMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(secrets)?).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        }
        Ok(())
    }

    pub async fn apply(
        &self,
        action: SecretAction,
        path: &str,
        value: Option<&str>,
    ) -> Result<SecretOutcome> {
        let mut secrets = self.read().await?;
        let outcome = apply_secret_action(&mut secrets, action, path, value)?;
        if outcome.changed {
            self.write(&secrets).await?;
            tracing::debug!(secret = path, %action, "Updated local secret store");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_store_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalSecretStore::new(dir.path(), "local");

        store
            .apply(SecretAction::Set, "backend/JWT_SECRET", Some("s3cr3t"))
            .await
            .unwrap();
        store
            .apply(SecretAction::Set, "frontend/NEXTAUTH_SECRET", Some("x"))
            .await
            .unwrap();

        let got = store
            .apply(SecretAction::Get, "backend/JWT_SECRET", None)
            .await
            .unwrap();
        assert_eq!(got.value.as_deref(), Some("s3cr3t"));

        let listed = store.apply(SecretAction::List, "backend/", None).await.unwrap();
        assert_eq!(listed.names, vec!["backend/JWT_SECRET"]);

        let deleted = store
            .apply(SecretAction::Delete, "backend/JWT_SECRET", None)
            .await
            .unwrap();
        assert!(deleted.changed);

        let err = store
            .apply(SecretAction::Get, "backend/JWT_SECRET", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::SecretNotFound(_)));
    }

    #[test]
    fn test_set_requires_value() {
        let mut secrets = BTreeMap::new();
        assert!(apply_secret_action(&mut secrets, SecretAction::Set, "k", None).is_err());
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let mut secrets = BTreeMap::new();
        let outcome = apply_secret_action(&mut secrets, SecretAction::Delete, "k", None).unwrap();
        assert!(!outcome.changed);
    }
}
