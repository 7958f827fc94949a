mod common;

use common::TEST_ENVIRONMENT;
use semiont::commands::restart;
use semiont::executor::{BACKUP, CHECK, Executor, RESTORE, START, STOP};
use semiont::platforms::PlatformSet;
use semiont_config::{ServiceDeployment, resolve_services};
use semiont_core::{EnvironmentConfig, RuntimeFlags, Verb};
use semiont_platform::{MockPlatform, ServiceStatus, VerbDetails, VerbOptions};
use std::path::PathBuf;
use std::sync::Arc;

fn setup(flags: RuntimeFlags) -> (Executor, Arc<MockPlatform>, Vec<ServiceDeployment>) {
    let environment: EnvironmentConfig = serde_json::from_str(TEST_ENVIRONMENT).unwrap();
    let deployments = resolve_services(&environment, "all").unwrap();
    let mock = Arc::new(MockPlatform::new());
    let mut platforms = PlatformSet::new();
    platforms.insert(mock.clone());
    let executor = Executor::new(
        PathBuf::from("/srv/demo"),
        "dev",
        Arc::new(environment),
        platforms,
        flags,
    );
    (executor, mock, deployments)
}

fn names(results: &semiont_platform::CommandResults) -> Vec<&str> {
    results.results.iter().map(|r| r.entity.as_str()).collect()
}

#[tokio::test]
async fn test_start_then_stop_order() {
    let (executor, mock, deployments) = setup(RuntimeFlags::default());
    let options = VerbOptions::default();

    let started = executor.execute(&START, &deployments, &options).await;
    assert_eq!(names(&started), vec!["database", "backend", "frontend"]);
    assert_eq!(mock.running(), vec!["backend", "database", "frontend"]);

    let stopped = executor.execute(&STOP, &deployments, &options).await;
    assert_eq!(names(&stopped), vec!["frontend", "backend", "database"]);
    assert!(mock.running().is_empty());
    assert!(!stopped.has_failures());
}

#[tokio::test]
async fn test_failure_does_not_stop_remaining_services() {
    let (executor, mock, deployments) = setup(RuntimeFlags::default());
    mock.fail_on(Verb::Stop, "backend");

    let results = executor
        .execute(&STOP, &deployments, &VerbOptions::default())
        .await;

    assert_eq!(results.summary.total, 3);
    assert_eq!(results.summary.succeeded, 2);
    assert_eq!(results.summary.failed, 1);
    assert!(results.has_failures());
    let backend = &results.results[1];
    assert_eq!(backend.entity, "backend");
    assert!(!backend.success);
    assert!(backend.error.as_deref().unwrap().contains("Simulated failure"));
}

#[tokio::test]
async fn test_zero_services() {
    let (executor, mock, _) = setup(RuntimeFlags::default());
    let results = executor.execute(&CHECK, &[], &VerbOptions::default()).await;

    assert_eq!(results.summary.total, 0);
    assert!(!results.has_failures());
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_check_reflects_start() {
    let (executor, _mock, deployments) = setup(RuntimeFlags::default());
    let backend: Vec<ServiceDeployment> = deployments
        .into_iter()
        .filter(|d| d.name == "backend")
        .collect();
    let options = VerbOptions::default();

    executor.execute(&START, &backend, &options).await;
    let checked = executor.execute(&CHECK, &backend, &options).await;

    assert_eq!(checked.results[0].status(), Some(ServiceStatus::Running));
}

#[tokio::test]
async fn test_backup_then_restore_latest() {
    let (executor, _mock, deployments) = setup(RuntimeFlags::default());
    let database: Vec<ServiceDeployment> = deployments
        .into_iter()
        .filter(|d| d.name == "database")
        .collect();
    let options = VerbOptions::default();

    let backup = executor.execute(&BACKUP, &database, &options).await;
    let Some(VerbDetails::Backup(details)) = &backup.results[0].details else {
        panic!("expected backup details");
    };
    let backup_id = details.backup_id.clone();

    let restored = executor.execute(&RESTORE, &database, &options).await;
    let Some(VerbDetails::Restore(details)) = &restored.results[0].details else {
        panic!("expected restore details");
    };
    assert_eq!(details.backup_id, backup_id);
}

#[tokio::test]
async fn test_dry_run_leaves_mock_untouched() {
    let flags = RuntimeFlags {
        dry_run: true,
        ..Default::default()
    };
    let (executor, mock, deployments) = setup(flags);

    let results = executor
        .execute(&START, &deployments, &VerbOptions::default())
        .await;

    assert_eq!(results.summary.succeeded, 3);
    assert!(results.execution_context.dry_run);
    assert_eq!(mock.record_count(), 0);
}

#[tokio::test]
async fn test_restart_skips_services_that_failed_to_stop() {
    let (executor, mock, deployments) = setup(RuntimeFlags::default());
    let options = VerbOptions::default();
    executor.execute(&START, &deployments, &options).await;
    mock.fail_on(Verb::Stop, "backend");

    let results = restart::handle(&executor, &deployments, &options).await;

    assert_eq!(results.command, "restart");
    let verbs: Vec<(Verb, &str)> = results
        .results
        .iter()
        .map(|r| (r.verb, r.entity.as_str()))
        .collect();
    assert_eq!(
        verbs,
        vec![
            (Verb::Stop, "frontend"),
            (Verb::Stop, "backend"),
            (Verb::Stop, "database"),
            (Verb::Start, "database"),
            (Verb::Start, "frontend"),
        ]
    );
    assert_eq!(results.summary.failed, 1);
}
