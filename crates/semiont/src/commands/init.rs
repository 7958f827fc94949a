use colored::Colorize;
use semiont_config::init::{DEFAULT_ENVIRONMENTS, init_project};
use std::path::{Path, PathBuf};

/// Scaffold a project in `root`
///
/// The project name defaults to the directory name.
pub fn handle(
    root: &Path,
    name: Option<String>,
    environments: Vec<String>,
    force: bool,
    quiet: bool,
) -> anyhow::Result<Vec<PathBuf>> {
    let name = name
        .or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "semiont".to_string());
    let environments = if environments.is_empty() {
        DEFAULT_ENVIRONMENTS.iter().map(|e| e.to_string()).collect()
    } else {
        environments
    };

    let written = init_project(root, &name, &environments, force)?;

    if !quiet {
        println!("{}", format!("✓ Initialized project '{}'", name).green().bold());
        for path in &written {
            println!("  • {}", path.display().to_string().cyan());
        }
        println!();
        println!("{}", "Next:".bold());
        println!("  {} start -e {}", "semiont".cyan(), environments[0]);
    }
    Ok(written)
}
