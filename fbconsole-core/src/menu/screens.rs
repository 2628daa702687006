//! Text content of every screen.

use crate::menu::ConfirmAction;
use crate::system::probe::{summarize, ConnectivitySummary, ProbeResult, ProbeStatus};
use crate::system::NetworkInterface;
use crate::config::ProbeTarget;

pub const MAIN_TITLE: &str = "System Information";
pub const ENTER_HINT: &str = "Press Enter for the configuration menu";
pub const ANY_KEY: &str = "Press any key to return";

pub fn footer_lines(support_contact: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(contact) = support_contact {
        lines.push(format!("Support: {}", contact));
    }
    lines.push(ENTER_HINT.to_string());
    lines
}

pub fn config_menu() -> Vec<String> {
    [
        "=== Configuration ===",
        "",
        "1. Network interfaces",
        "2. Restart services",
        "3. Network connectivity test",
        "4. Reboot",
        "5. Shut down",
        "",
        "Press a number to choose, q to return",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn confirm_prompt(action: ConfirmAction, services: &[String]) -> Vec<String> {
    let question = match action {
        ConfirmAction::RestartServices => format!("Restart {}?", services.join(", ")),
        ConfirmAction::Reboot => "Reboot this device?".to_string(),
        ConfirmAction::Shutdown => "Shut this device down?".to_string(),
    };
    vec![
        question,
        String::new(),
        "Press 'y' to confirm".to_string(),
        "Press any other key to cancel".to_string(),
    ]
}

pub fn action_in_progress(action: ConfirmAction) -> &'static str {
    match action {
        ConfirmAction::RestartServices => "Restarting services...",
        ConfirmAction::Reboot => "Rebooting...",
        ConfirmAction::Shutdown => "Shutting down...",
    }
}

pub fn network_interfaces(interfaces: &[NetworkInterface]) -> Vec<String> {
    let mut lines = vec!["=== Network Interfaces ===".to_string(), String::new()];
    if interfaces.is_empty() {
        lines.push("No interfaces found".to_string());
    }
    for iface in interfaces {
        lines.push(format!("{}: {}", iface.name, if iface.up { "up" } else { "down" }));
        if let Some(mac) = &iface.mac {
            lines.push(format!("  MAC: {}", mac));
        }
        for addr in &iface.ipv4 {
            lines.push(format!("  IPv4: {}", addr));
        }
        for addr in &iface.ipv6 {
            lines.push(format!("  IPv6: {}", addr));
        }
    }
    lines.push(String::new());
    lines.push(ANY_KEY.to_string());
    lines
}

pub fn connectivity_progress(index: usize, total: usize, target: &ProbeTarget) -> Vec<String> {
    vec![
        format!("Connectivity test {}/{}", index, total),
        String::new(),
        format!("Testing {} ({})", target.name, target.host),
        "Please wait...".to_string(),
    ]
}

pub fn connectivity_report(results: &[ProbeResult]) -> Vec<String> {
    let mut lines = vec!["=== Connectivity Results ===".to_string(), String::new()];
    for r in results {
        let status = match r.status() {
            ProbeStatus::Reachable => "ok",
            ProbeStatus::Degraded => "degraded",
            ProbeStatus::Unreachable => "unreachable",
        };
        lines.push(format!("{} ({}): {}", r.target.name, r.target.host, status));
        if r.received > 0 {
            lines.push(format!(
                "  sent {} received {} loss {:.1}%",
                r.sent, r.received, r.loss_percent
            ));
            if let Some(avg) = r.avg_latency_ms {
                lines.push(format!("  average latency {:.1} ms", avg));
            }
        }
        if let Some(err) = &r.error {
            lines.push(format!("  {}", err));
        }
    }
    lines.push(String::new());
    lines.push(match summarize(results) {
        ConnectivitySummary::Good => "Network: good, all targets reachable".to_string(),
        ConnectivitySummary::Partial { reachable, total } => {
            format!("Network: partial, {}/{} targets reachable", reachable, total)
        }
        ConnectivitySummary::Failed => "Network: down, no target reachable".to_string(),
    });
    lines.push(String::new());
    lines.push(ANY_KEY.to_string());
    lines
}

/// A free-form message followed by the return hint.
pub fn message(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    lines.push(String::new());
    lines.push(ANY_KEY.to_string());
    lines
}
