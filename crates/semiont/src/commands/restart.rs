use crate::executor::{Executor, START, STOP};
use semiont_config::ServiceDeployment;
use semiont_platform::{CommandResults, VerbOptions};
use std::time::Instant;

/// `stop` in reverse order, then `start` in startup order
///
/// Services whose stop failed are not started again.
pub async fn handle(
    executor: &Executor,
    deployments: &[ServiceDeployment],
    options: &VerbOptions,
) -> CommandResults {
    let started = Instant::now();
    let mut results = executor.run(&STOP, deployments, options).await;

    let stopped: Vec<ServiceDeployment> = deployments
        .iter()
        .filter(|d| {
            results
                .iter()
                .any(|r| r.entity == d.name && r.success)
        })
        .cloned()
        .collect();
    results.extend(executor.run(&START, &stopped, options).await);

    CommandResults::new(
        "restart",
        &executor.environment().name,
        results,
        started.elapsed(),
        executor.execution_context(),
    )
}
