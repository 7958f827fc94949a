//! Parsers for container CLI text output

use crate::error::OutputParseError;
use regex::Regex;
use semiont_platform::LogSummary;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// `--format` template whose output [`parse_inspect`] understands
pub const INSPECT_FORMAT: &str =
    "{{.State.Status}}|{{.Id}}|{{if .State.Health}}{{.State.Health.Status}}{{end}}";

static INSPECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z]+)\|([0-9a-f]{12,64})\|([a-z]*)$").expect("static regex")
});

static PORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)/(?:tcp|udp|sctp) -> (?:\[[^\]]*\]|[^:\s]+):(\d+)$").expect("static regex")
});

static LOG_TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z\s+").expect("static regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Exited,
    Dead,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InspectState {
    pub state: ContainerState,
    pub id: String,
    /// Healthcheck status when the image defines one
    pub health: Option<String>,
}

impl InspectState {
    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }

    pub fn is_unhealthy(&self) -> bool {
        self.health.as_deref() == Some("unhealthy")
    }
}

/// Parse `inspect --format INSPECT_FORMAT`
pub fn parse_inspect(output: &str) -> Result<InspectState, OutputParseError> {
    let line = output.trim();
    if line.is_empty() {
        return Err(OutputParseError::Empty { what: "inspect" });
    }
    let unrecognized = || OutputParseError::Unrecognized {
        what: "inspect",
        line: line.to_string(),
    };

    let caps = INSPECT_RE.captures(line).ok_or_else(unrecognized)?;
    let state = match &caps[1] {
        "created" => ContainerState::Created,
        "running" => ContainerState::Running,
        "paused" => ContainerState::Paused,
        "restarting" => ContainerState::Restarting,
        "exited" | "stopped" => ContainerState::Exited,
        "dead" | "removing" => ContainerState::Dead,
        _ => return Err(unrecognized()),
    };
    let health = Some(caps[3].to_string()).filter(|h| !h.is_empty());

    Ok(InspectState {
        state,
        id: caps[2].to_string(),
        health,
    })
}

/// Parse `port <container>` into container port → host port
///
/// Duplicate lines for IPv4 and IPv6 bindings collapse into one entry.
pub fn parse_ports(output: &str) -> Result<BTreeMap<u16, u16>, OutputParseError> {
    let mut ports = BTreeMap::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let caps = PORT_RE
            .captures(line)
            .ok_or_else(|| OutputParseError::Unrecognized {
                what: "port",
                line: line.to_string(),
            })?;
        let parse = |s: &str| {
            s.parse::<u16>().map_err(|_| OutputParseError::Unrecognized {
                what: "port",
                line: line.to_string(),
            })
        };
        ports.insert(parse(&caps[1])?, parse(&caps[2])?);
    }
    Ok(ports)
}

/// Summarise `logs --timestamps --tail N`, dropping the timestamp prefix
pub fn parse_logs(output: &str, limit: usize) -> LogSummary {
    let stripped: Vec<String> = output
        .lines()
        .map(|l| LOG_TIMESTAMP_RE.replace(l, "").into_owned())
        .collect();
    LogSummary::from_lines(stripped.iter().map(String::as_str), limit)
}

/// Whether a `ps`/`top` listing has a process whose command mentions `needle`
pub fn process_listed(output: &str, needle: &str) -> bool {
    output
        .lines()
        .skip(1)
        .any(|line| line.split_whitespace().any(|field| field.contains(needle)))
}
