use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const TEST_ENVIRONMENT: &str = r#"{
  "name": "test",
  "platform": { "default": "mock" },
  "services": {
    "frontend": { "port": 3000 },
    "backend": { "port": 4000 },
    "database": { "type": "postgres", "port": 5432 }
  }
}"#;

/// A project on disk with a mock-platform `test` environment
pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::write(
            root.path().join("semiont.json"),
            r#"{ "name": "demo", "defaultEnvironment": "test" }"#,
        )
        .unwrap();
        let project = Self { root };
        project.write_environment("test", TEST_ENVIRONMENT);
        project
    }

    pub fn write_environment(&self, name: &str, content: &str) {
        let dir = self.root.path().join("environments");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.json", name)), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    #[allow(dead_code)]
    pub fn exists(&self, relative: impl AsRef<Path>) -> bool {
        self.root.path().join(relative).exists()
    }
}
