use crate::output::OutputFormat;
use crate::platforms::PlatformSet;
use crate::session::Session;
use clap::Subcommand;
use colored::Colorize;
use semiont_core::PlatformType;
use semiont_platform::{SecretAction, SecretOutcome};
use serde::Serialize;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigureAction {
    /// Show the resolved environment and where each service runs
    Show,
    /// List secret names under a prefix
    List {
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Print one secret
    Get { path: String },
    /// Store a secret
    Set { path: String, value: String },
    /// Remove a secret
    Delete { path: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceRow {
    name: String,
    platform: PlatformType,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvironmentView {
    environment: String,
    default_platform: Option<PlatformType>,
    services: Vec<ServiceRow>,
}

pub async fn handle(
    session: &Session,
    action: ConfigureAction,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (action, path, value) = match action {
        ConfigureAction::Show => return show(session, format),
        ConfigureAction::List { prefix } => (SecretAction::List, prefix, None),
        ConfigureAction::Get { path } => (SecretAction::Get, path, None),
        ConfigureAction::Set { path, value } => (SecretAction::Set, path, Some(value)),
        ConfigureAction::Delete { path } => (SecretAction::Delete, path, None),
    };

    let platform_type = secret_platform(session);
    let mut platforms = PlatformSet::new();
    let platform = platforms
        .build(&session.project_root, &session.environment, platform_type)
        .await?;
    tracing::debug!(%action, %path, platform = %platform_type, "Managing secret");

    if session.flags.dry_run && matches!(action, SecretAction::Set | SecretAction::Delete) {
        println!(
            "{}",
            format!("dry run: would {} {} on {}", action, path, platform_type).yellow()
        );
        return Ok(());
    }

    let outcome = platform
        .manage_secret(action, &path, value.as_deref())
        .await?;
    print_outcome(action, &outcome, format)
}

/// Secrets live on the environment's default platform
fn secret_platform(session: &Session) -> PlatformType {
    session
        .environment
        .platform
        .default
        .unwrap_or(PlatformType::Process)
}

fn show(session: &Session, format: OutputFormat) -> anyhow::Result<()> {
    let deployments = session.services("all")?;
    let view = EnvironmentView {
        environment: session.environment.name.clone(),
        default_platform: session.environment.platform.default,
        services: deployments
            .into_iter()
            .map(|d| ServiceRow {
                name: d.name,
                platform: d.platform,
            })
            .collect(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&view)?),
        OutputFormat::Summary | OutputFormat::Table => {
            println!("{} {}", "Environment:".bold(), view.environment.cyan());
            if let Some(default) = view.default_platform {
                println!("{} {}", "Default platform:".bold(), default);
            }
            println!("{}", "Services:".bold());
            for row in &view.services {
                println!("  • {} ({})", row.name, row.platform.to_string().dimmed());
            }
        }
    }
    Ok(())
}

fn print_outcome(
    action: SecretAction,
    outcome: &SecretOutcome,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(outcome)?),
        OutputFormat::Summary | OutputFormat::Table => match action {
            SecretAction::Get => println!("{}", outcome.value.as_deref().unwrap_or_default()),
            SecretAction::List => {
                for name in &outcome.names {
                    println!("{}", name);
                }
            }
            SecretAction::Set => println!("{} {}", "✓ Stored".green(), outcome.path),
            SecretAction::Delete if outcome.changed => {
                println!("{} {}", "✓ Deleted".green(), outcome.path)
            }
            SecretAction::Delete => println!("{} {}", "Nothing to delete at".yellow(), outcome.path),
        },
    }
    Ok(())
}
