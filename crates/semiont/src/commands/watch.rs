use crate::executor::{CHECK, Executor};
use crate::output::{OutputFormat, render};
use semiont_config::ServiceDeployment;
use semiont_platform::{CommandResults, VerbOptions};
use std::time::Duration;

/// Re-run `check` every `interval` until SIGINT or SIGTERM
///
/// Returns the last round's results.
pub async fn handle(
    executor: &Executor,
    deployments: &[ServiceDeployment],
    options: &VerbOptions,
    format: OutputFormat,
    interval: Duration,
) -> anyhow::Result<CommandResults> {
    let mut ticker = tokio::time::interval(interval);
    let mut shutdown = Box::pin(shutdown_signal());
    let mut last = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let results = executor.execute(&CHECK, deployments, options).await;
                println!("{}", render(&results, format)?);
                if !format.is_structured() {
                    println!();
                }
                last = Some(results);
            }
            _ = &mut shutdown => {
                tracing::info!("Watch interrupted");
                break;
            }
        }
    }

    Ok(match last {
        Some(results) => results,
        None => executor.execute(&CHECK, &[], options).await,
    })
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
