//! Rendering of command results

use clap::ValueEnum;
use colored::Colorize;
use semiont_platform::{CommandResult, CommandResults, ServiceStatus, VerbDetails};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable, coloured
    #[default]
    Summary,
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Structured formats print the results even under `--quiet`
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            OutputFormat::Json | OutputFormat::Yaml | OutputFormat::Table
        )
    }
}

pub fn render(results: &CommandResults, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Summary => render_summary(results),
        OutputFormat::Table => render_table(results),
        OutputFormat::Json => serde_json::to_string_pretty(results)?,
        OutputFormat::Yaml => serde_yaml::to_string(results)?,
    })
}

fn status_label(status: ServiceStatus) -> colored::ColoredString {
    let text = status.to_string();
    match status {
        ServiceStatus::Running => text.green(),
        ServiceStatus::Stopped => text.dimmed(),
        ServiceStatus::Unhealthy => text.red(),
        ServiceStatus::Unknown => text.yellow(),
    }
}

/// One-line description of what a verb produced
pub fn detail_line(result: &CommandResult) -> String {
    if let Some(error) = &result.error {
        return error.clone();
    }
    if result.metadata.get("dryRun").and_then(|v| v.as_bool()) == Some(true) {
        return "dry run, nothing changed".to_string();
    }
    match &result.details {
        Some(VerbDetails::Start(d)) => d
            .endpoint
            .as_ref()
            .map(|e| format!("started at {}", e))
            .unwrap_or_else(|| "started".to_string()),
        Some(VerbDetails::Stop(d)) => {
            if d.graceful {
                "stopped".to_string()
            } else {
                "stopped (forced)".to_string()
            }
        }
        Some(VerbDetails::Check(d)) => {
            let mut line = d.status.to_string();
            if let Some(health) = &d.health {
                line.push_str(if health.healthy { ", healthy" } else { ", unhealthy" });
            }
            if !d.state_verified {
                line.push_str(", state not verified");
            }
            line
        }
        Some(VerbDetails::Update(d)) => format!("updated ({})", d.strategy),
        Some(VerbDetails::Provision(d)) => format!("{} resources", d.resources.len()),
        Some(VerbDetails::Publish(d)) => d.artifacts.join(", "),
        Some(VerbDetails::Backup(d)) => format!("backup {}", d.backup_id),
        Some(VerbDetails::Restore(d)) => format!("restored {}", d.backup_id),
        Some(VerbDetails::Test(d)) => format!(
            "suite {} {}",
            d.suite,
            if d.passed { "passed" } else { "failed" }
        ),
        Some(VerbDetails::Exec(d)) => d.stdout.trim_end().to_string(),
        None => String::new(),
    }
}

fn render_summary(results: &CommandResults) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} ({})",
        results.command.bold(),
        results.environment.cyan(),
        format!("{} ms", results.duration).dimmed()
    );
    if results.execution_context.dry_run {
        let _ = writeln!(out, "{}", "dry run: no changes were made".yellow());
    }

    for result in &results.results {
        let mark = if result.success { "✓".green() } else { "✗".red() };
        let label = match result.status() {
            Some(status) => format!(" [{}]", status_label(status)),
            None => String::new(),
        };
        let _ = writeln!(
            out,
            "  {} {} ({}){} {}",
            mark,
            result.entity.bold(),
            result.platform.to_string().dimmed(),
            label,
            detail_line(result)
        );
        for warning in &result.warnings {
            let _ = writeln!(out, "      {} {}", "⚠".yellow(), warning);
        }
    }

    let summary = &results.summary;
    let totals = format!(
        "{} total, {} succeeded, {} failed, {} warnings",
        summary.total, summary.succeeded, summary.failed, summary.warnings
    );
    let _ = write!(
        out,
        "{}",
        if summary.failed > 0 {
            totals.red()
        } else {
            totals.green()
        }
    );
    out
}

fn render_table(results: &CommandResults) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<16} {:<10} {:<10} {:<8} {}",
        "SERVICE", "PLATFORM", "VERB", "RESULT", "DETAILS"
    );
    for result in &results.results {
        let _ = writeln!(
            out,
            "{:<16} {:<10} {:<10} {:<8} {}",
            result.entity,
            result.platform.to_string(),
            result.verb.to_string(),
            if result.success { "ok" } else { "failed" },
            detail_line(result)
        );
    }
    let _ = write!(
        out,
        "{} total, {} succeeded, {} failed",
        results.summary.total, results.summary.succeeded, results.summary.failed
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use semiont_core::{PlatformType, Verb};
    use semiont_platform::ExecutionContext;
    use semiont_platform::result::StopDetails;
    use std::time::Duration;

    fn sample() -> CommandResults {
        CommandResults::new(
            "stop",
            "local",
            vec![
                CommandResult::success(
                    "frontend",
                    PlatformType::Process,
                    VerbDetails::Stop(StopDetails {
                        stop_time: Utc::now(),
                        graceful: true,
                    }),
                ),
                CommandResult::failure("backend", PlatformType::Container, Verb::Stop, "boom"),
            ],
            Duration::from_millis(12),
            ExecutionContext {
                user: "dev".into(),
                cwd: "/srv".into(),
                dry_run: false,
            },
        )
    }

    #[test]
    fn test_json_envelope() {
        let json = render(&sample(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["command"], "stop");
        assert_eq!(value["summary"]["failed"], 1);
        assert_eq!(value["results"][1]["error"], "boom");
        assert_eq!(value["executionContext"]["dryRun"], false);
    }

    #[test]
    fn test_yaml_envelope() {
        let yaml = render(&sample(), OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("command: stop"));
        assert!(yaml.contains("entity: backend"));
    }

    #[test]
    fn test_table() {
        colored::control::set_override(false);
        let table = render(&sample(), OutputFormat::Table).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("SERVICE"));
        assert!(lines[1].starts_with("frontend") && lines[1].contains("stopped"));
        assert!(lines[2].contains("failed") && lines[2].ends_with("boom"));
        assert_eq!(lines[3], "2 total, 1 succeeded, 1 failed");
    }

    #[test]
    fn test_structured_formats() {
        assert!(OutputFormat::Json.is_structured());
        assert!(OutputFormat::Yaml.is_structured());
        assert!(OutputFormat::Table.is_structured());
        assert!(!OutputFormat::Summary.is_structured());
    }

    #[test]
    fn test_detail_line_for_dry_run() {
        let result = CommandResult::dry_run("backend", PlatformType::Mock, Verb::Start);
        assert_eq!(detail_line(&result), "dry run, nothing changed");
    }
}
