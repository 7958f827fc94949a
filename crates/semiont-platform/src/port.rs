//! Host process helpers: who holds a port, and how to stop them

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// PIDs listening on or connected to `port`, via `lsof`
///
/// A missing `lsof` or a non-zero exit both read as "nobody".
pub async fn find_pids_by_port(port: u16) -> Vec<i32> {
    let output = Command::new("lsof")
        .arg("-t")
        .arg(format!("-i:{}", port))
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .lines()
            .filter_map(|line| line.trim().parse::<i32>().ok())
            .collect(),
        _ => Vec::new(),
    }
}

pub fn is_process_alive(pid: i32) -> bool {
    signal::kill(Pid::from_raw(pid), None).is_ok()
}

/// SIGTERM, wait up to five seconds, then SIGKILL
///
/// Returns `true` when the process exited on SIGTERM (or was already gone).
pub async fn kill_process_gracefully(pid: i32) -> bool {
    let nix_pid = Pid::from_raw(pid);

    info!("Sending SIGTERM to process {}", pid);
    if let Err(e) = signal::kill(nix_pid, Signal::SIGTERM) {
        debug!("Failed to send SIGTERM to {}: {}", pid, e);
        return true;
    }

    let start = Instant::now();
    while start.elapsed() < GRACE_PERIOD {
        if !is_process_alive(pid) {
            info!("Process {} exited gracefully", pid);
            return true;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    warn!("Timeout reached. Sending SIGKILL to process {}", pid);
    let _ = signal::kill(nix_pid, Signal::SIGKILL);
    false
}

/// Stop whatever occupies `port` so a service can bind it
pub async fn ensure_port_available(port: u16) {
    let pids = find_pids_by_port(port).await;
    if pids.is_empty() {
        return;
    }

    for pid in pids {
        warn!(
            "Port {} is occupied by process {}. Attempting cleanup...",
            port, pid
        );
        kill_process_gracefully(pid).await;
    }

    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(1) {
        if find_pids_by_port(port).await.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
