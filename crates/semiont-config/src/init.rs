//! `semiont init` project scaffolding

use crate::{ConfigError, ENVIRONMENTS_DIR, PROJECT_FILE, ProjectConfig, Result, environment_path};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_ENVIRONMENTS: &[&str] = &["local", "test", "staging", "production"];

/// Write `semiont.json` and one file per environment
///
/// Existing files are only replaced with `force`. Returns the paths written.
pub fn init_project(
    root: &Path,
    name: &str,
    environments: &[String],
    force: bool,
) -> Result<Vec<PathBuf>> {
    let project_file = root.join(PROJECT_FILE);
    let mut targets = vec![project_file.clone()];
    targets.extend(environments.iter().map(|e| environment_path(root, e)));

    if !force {
        if let Some(existing) = targets.iter().find(|p| p.exists()) {
            return Err(ConfigError::AlreadyInitialized(existing.clone()));
        }
    }

    std::fs::create_dir_all(root.join(ENVIRONMENTS_DIR))?;

    let project = ProjectConfig {
        name: name.to_string(),
        version: Some("1.0.0".to_string()),
        default_environment: environments.first().cloned(),
    };
    write_json(&project_file, &serde_json::to_value(&project)?)?;

    for env in environments {
        write_json(&environment_path(root, env), &environment_template(name, env))?;
    }

    info!(root = %root.display(), environments = environments.len(), "Initialized project");
    Ok(targets)
}

/// Starting configuration for a named environment
///
/// `local` runs everything on the host with a containerised database, `test`
/// uses the mock platform, anything else targets AWS.
pub fn environment_template(project: &str, env: &str) -> Value {
    match env {
        "local" => json!({
            "name": env,
            "platform": { "default": "process" },
            "site": { "domain": "localhost" },
            "services": {
                "database": {
                    "platform": { "type": "container" },
                    "type": "postgres",
                    "image": "postgres:15-alpine",
                    "port": 5432,
                    "environment": { "POSTGRES_PASSWORD": "localpass" }
                },
                "backend": {
                    "command": "npm run dev",
                    "path": "apps/backend",
                    "port": 4000
                },
                "frontend": {
                    "command": "npm run dev",
                    "path": "apps/frontend",
                    "port": 3000
                },
                "filesystem": { "path": "./data/uploads" }
            }
        }),
        "test" => json!({
            "name": env,
            "platform": { "default": "mock" },
            "services": {
                "database": { "type": "postgres" },
                "backend": { "port": 4000 },
                "frontend": { "port": 3000 }
            }
        }),
        _ => json!({
            "name": env,
            "platform": { "default": "aws" },
            "site": { "domain": format!("{}.example.com", env) },
            "aws": {
                "region": "us-east-1",
                "stacks": {
                    "data": format!("{}DataStack", stack_prefix(project)),
                    "app": format!("{}AppStack", stack_prefix(project))
                }
            },
            "services": {
                "database": { "type": "postgres" },
                "backend": { "port": 4000, "secrets": ["JWT_SECRET"] },
                "frontend": { "port": 3000 },
                "filesystem": { "mountPath": "/mnt/efs/uploads" }
            }
        }),
    }
}

/// `my-app` becomes `MyApp`
fn stack_prefix(project: &str) -> String {
    project
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content + "\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{list_environments, load_environment, load_project};
    use semiont_core::PlatformType;

    fn envs() -> Vec<String> {
        DEFAULT_ENVIRONMENTS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_init_creates_loadable_environments() {
        let dir = tempfile::tempdir().unwrap();
        let written = init_project(dir.path(), "my-app", &envs(), false).unwrap();
        assert_eq!(written.len(), 5);

        assert_eq!(
            list_environments(dir.path()),
            vec!["local", "production", "staging", "test"]
        );

        let project = load_project(dir.path()).unwrap();
        assert_eq!(project.name, "my-app");
        assert_eq!(project.default_environment.as_deref(), Some("local"));

        let local = load_environment(dir.path(), "local").unwrap();
        assert_eq!(local.platform_for("database").unwrap(), PlatformType::Container);
        assert_eq!(local.platform_for("backend").unwrap(), PlatformType::Process);

        let staging = load_environment(dir.path(), "staging").unwrap();
        let stacks: Vec<&str> = staging.aws.as_ref().unwrap().stacks.iter().collect();
        assert_eq!(stacks, vec!["MyAppDataStack", "MyAppAppStack"]);
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        init_project(dir.path(), "demo", &envs(), false).unwrap();

        let err = init_project(dir.path(), "demo", &envs(), false).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyInitialized(_)));

        init_project(dir.path(), "demo", &envs(), true).unwrap();
    }

    #[test]
    fn test_stack_prefix() {
        assert_eq!(stack_prefix("semiont"), "Semiont");
        assert_eq!(stack_prefix("my_cool-app"), "MyCoolApp");
    }
}
