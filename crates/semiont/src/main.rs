use clap::{Parser, Subcommand};
use colored::Colorize;
use semiont::commands::{self, configure::ConfigureAction};
use semiont::executor::{
    BACKUP, CHECK, CommandDescriptor, EXEC, PROVISION, PUBLISH, RESTORE, START, STOP, TEST,
    UPDATE,
};
use semiont::output::{OutputFormat, render};
use semiont::session::Session;
use semiont_core::RuntimeFlags;
use semiont_platform::{CommandResults, VerbOptions};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "semiont")]
#[command(version, about = "Deploy and operate Semiont services", long_about = None)]
struct Cli {
    /// Environment to operate on
    #[arg(short, long, global = true, env = "SEMIONT_ENV")]
    environment: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Summary)]
    output: OutputFormat,

    /// Service to target, or "all"
    #[arg(short, long, global = true, default_value = "all")]
    service: String,

    /// Project root (defaults to searching upwards from the current directory)
    #[arg(long, global = true, env = "SEMIONT_ROOT")]
    root: Option<PathBuf>,

    /// Report what would happen without changing anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Ignore cached AWS discovery results
    #[arg(long, global = true)]
    force_discovery: bool,

    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create semiont.json and environment files
    Init {
        /// Project name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
        /// Environments to create
        #[arg(long = "environments", value_delimiter = ',')]
        environments: Vec<String>,
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
    /// Create the infrastructure services need
    Provision {
        /// Stack to deploy instead of the one derived from the service
        #[arg(long)]
        stack: Option<String>,
    },
    /// Inspect the environment or manage secrets
    Configure {
        #[command(subcommand)]
        action: ConfigureAction,
    },
    /// Start services in dependency order
    Start,
    /// Stop services in reverse dependency order
    Stop {
        #[arg(short, long)]
        force: bool,
        /// Seconds to wait before forcing
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Stop then start services
    Restart {
        #[arg(short, long)]
        force: bool,
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Build and push service images
    Publish {
        #[arg(long)]
        tag: Option<String>,
    },
    /// Roll services onto a new version
    Update {
        #[arg(long)]
        tag: Option<String>,
    },
    /// Report live status and health
    Check,
    /// Run check repeatedly until interrupted
    Watch {
        /// Seconds between checks
        #[arg(long, default_value_t = 30)]
        interval: u64,
    },
    /// Run a service's test suite
    Test {
        #[arg(long)]
        suite: Option<String>,
    },
    /// Back up service data
    Backup,
    /// Restore service data from a backup
    Restore {
        backup_id: String,
        /// Instance to restore into
        #[arg(long)]
        target: Option<String>,
    },
    /// Run a command inside a service
    Exec {
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Ok(false) when any service failed
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let cwd = std::env::current_dir()?;
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let flags = RuntimeFlags {
        verbose: cli.verbose,
        quiet: cli.quiet,
        dry_run: cli.dry_run,
        force_discovery: cli.force_discovery,
    };

    let (descriptor, options) = match cli.command {
        Commands::Init {
            name,
            environments,
            force,
        } => {
            let root = cli.root.unwrap_or(cwd);
            commands::init::handle(&root, name, environments, force, cli.quiet)?;
            return Ok(true);
        }
        Commands::Configure { action } => {
            let session = Session::load(
                cli.root.as_deref(),
                &cwd,
                &user,
                cli.environment.as_deref(),
                flags,
            )?;
            commands::configure::handle(&session, action, cli.output).await?;
            return Ok(true);
        }
        Commands::Restart { force, timeout } => {
            let session = Session::load(
                cli.root.as_deref(),
                &cwd,
                &user,
                cli.environment.as_deref(),
                flags,
            )?;
            let deployments = session.services(&cli.service)?;
            let executor = session.executor(&deployments).await?;
            let options = VerbOptions {
                force,
                timeout,
                ..Default::default()
            };
            let results = commands::restart::handle(&executor, &deployments, &options).await;
            return report(&results, cli.output, cli.quiet);
        }
        Commands::Watch { interval } => {
            let session = Session::load(
                cli.root.as_deref(),
                &cwd,
                &user,
                cli.environment.as_deref(),
                flags,
            )?;
            let deployments = session.services(&cli.service)?;
            let executor = session.executor(&deployments).await?;
            let results = commands::watch::handle(
                &executor,
                &deployments,
                &VerbOptions::default(),
                cli.output,
                Duration::from_secs(interval.max(1)),
            )
            .await?;
            return Ok(!results.has_failures());
        }
        Commands::Provision { stack } => (
            PROVISION,
            VerbOptions {
                target: stack,
                ..Default::default()
            },
        ),
        Commands::Start => (START, VerbOptions::default()),
        Commands::Stop { force, timeout } => (
            STOP,
            VerbOptions {
                force,
                timeout,
                ..Default::default()
            },
        ),
        Commands::Publish { tag } => (
            PUBLISH,
            VerbOptions {
                tag,
                ..Default::default()
            },
        ),
        Commands::Update { tag } => (
            UPDATE,
            VerbOptions {
                tag,
                ..Default::default()
            },
        ),
        Commands::Check => (CHECK, VerbOptions::default()),
        Commands::Test { suite } => (
            TEST,
            VerbOptions {
                test_suite: suite,
                ..Default::default()
            },
        ),
        Commands::Backup => (BACKUP, VerbOptions::default()),
        Commands::Restore { backup_id, target } => (
            RESTORE,
            VerbOptions {
                backup_id: Some(backup_id),
                target,
                ..Default::default()
            },
        ),
        Commands::Exec { command } => {
            if cli.service == "all" {
                anyhow::bail!("exec needs a single service; pass --service <name>");
            }
            (
                EXEC,
                VerbOptions {
                    exec_command: Some(command.join(" ")),
                    ..Default::default()
                },
            )
        }
    };

    let session = Session::load(
        cli.root.as_deref(),
        &cwd,
        &user,
        cli.environment.as_deref(),
        flags,
    )?;
    let deployments = session.services(&cli.service)?;
    execute(&session, &descriptor, &deployments, &options, cli.output, cli.quiet).await
}

async fn execute(
    session: &Session,
    descriptor: &CommandDescriptor,
    deployments: &[semiont_config::ServiceDeployment],
    options: &VerbOptions,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<bool> {
    let executor = session.executor(deployments).await?;
    let results = executor.execute(descriptor, deployments, options).await;
    report(&results, format, quiet)
}

fn report(results: &CommandResults, format: OutputFormat, quiet: bool) -> anyhow::Result<bool> {
    // Structured output is always printed so scripts get the envelope
    if !quiet || format.is_structured() {
        println!("{}", render(results, format)?);
    }
    Ok(!results.has_failures())
}
