//! Connectivity test: `ping` each configured target and parse the summary.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::config::ProbeTarget;

const PING_COUNT: &str = "3";
const PING_WAIT_SECS: &str = "3";
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub target: ProbeTarget,
    pub sent: u32,
    pub received: u32,
    pub loss_percent: f32,
    pub avg_latency_ms: Option<f32>,
    pub error: Option<String>,
}

impl ProbeResult {
    fn failed(target: &ProbeTarget, error: String) -> Self {
        Self {
            target: target.clone(),
            sent: 0,
            received: 0,
            loss_percent: 100.0,
            avg_latency_ms: None,
            error: Some(error),
        }
    }

    pub fn status(&self) -> ProbeStatus {
        if self.received == 0 {
            ProbeStatus::Unreachable
        } else if self.loss_percent > 0.0 {
            ProbeStatus::Degraded
        } else {
            ProbeStatus::Reachable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Reachable,
    Degraded,
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivitySummary {
    Good,
    Partial { reachable: usize, total: usize },
    Failed,
}

pub fn summarize(results: &[ProbeResult]) -> ConnectivitySummary {
    let reachable = results
        .iter()
        .filter(|r| r.status() == ProbeStatus::Reachable)
        .count();
    match reachable {
        0 => ConnectivitySummary::Failed,
        n if n == results.len() => ConnectivitySummary::Good,
        n => ConnectivitySummary::Partial {
            reachable: n,
            total: results.len(),
        },
    }
}

static PACKETS_REGEX: OnceLock<Regex> = OnceLock::new();
static RTT_REGEX: OnceLock<Regex> = OnceLock::new();

/// Pull (sent, received, loss %, average rtt ms) out of iputils/busybox output.
pub fn parse_ping_output(output: &str) -> Option<(u32, u32, f32, Option<f32>)> {
    let caps = PACKETS_REGEX
        .get_or_init(|| {
            Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received.*?([\d.]+)% packet loss")
                .expect("Invalid packets Regex")
        })
        .captures(output)?;
    let sent = caps[1].parse().ok()?;
    let received = caps[2].parse().ok()?;
    let loss = caps[3].parse().ok()?;
    let avg = RTT_REGEX
        .get_or_init(|| {
            Regex::new(r"= [\d.]+/([\d.]+)/[\d.]+(?:/[\d.]+)? ms").expect("Invalid rtt Regex")
        })
        .captures(output)
        .and_then(|c| c[1].parse().ok());
    Some((sent, received, loss, avg))
}

/// Hosts go straight onto a command line; keep them to hostname characters.
pub fn is_valid_host(host: &str) -> bool {
    !host.is_empty()
        && host.len() <= 253
        && !host.starts_with('-')
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'))
}

pub async fn probe_target(target: &ProbeTarget) -> ProbeResult {
    if !is_valid_host(&target.host) {
        return ProbeResult::failed(target, format!("invalid host {:?}", target.host));
    }

    tracing::info!("Probing {} ({})", target.name, target.host);
    let run = tokio::process::Command::new("ping")
        .args(["-c", PING_COUNT, "-W", PING_WAIT_SECS, &target.host])
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(PROBE_TIMEOUT, run).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return ProbeResult::failed(target, format!("cannot run ping: {}", e)),
        Err(_) => return ProbeResult::failed(target, "timed out".to_string()),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    match parse_ping_output(&stdout) {
        Some((sent, received, loss_percent, avg_latency_ms)) => ProbeResult {
            target: target.clone(),
            sent,
            received,
            loss_percent,
            avg_latency_ms,
            error: None,
        },
        None => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.lines().next().unwrap_or("no ping summary").trim();
            ProbeResult::failed(target, reason.to_string())
        }
    }
}

/// Probe every target in order, reporting `(index, total, target)` before each.
pub async fn run_connectivity_test<F>(targets: &[ProbeTarget], mut progress: F) -> Vec<ProbeResult>
where
    F: FnMut(usize, usize, &ProbeTarget),
{
    let mut results = Vec::with_capacity(targets.len());
    for (i, target) in targets.iter().enumerate() {
        progress(i + 1, targets.len(), target);
        results.push(probe_target(target).await);
    }
    results
}
