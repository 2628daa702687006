//! Privileged host actions behind the confirmation dialogs.

use std::time::Duration;

use crate::error::ConsoleError;

const POWER_TIMEOUT: Duration = Duration::from_secs(10);
const SERVICE_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_SERVICE_NAME: usize = 100;

pub fn require_root() -> Result<(), ConsoleError> {
    if nix::unistd::geteuid().is_root() {
        Ok(())
    } else {
        Err(ConsoleError::PermissionDenied(
            "this action requires root".into(),
        ))
    }
}

pub fn validate_service_name(name: &str) -> Result<(), ConsoleError> {
    if name.is_empty() || name.len() > MAX_SERVICE_NAME {
        return Err(ConsoleError::Config(format!(
            "service name length must be 1..={}",
            MAX_SERVICE_NAME
        )));
    }
    let ok = !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if !ok {
        return Err(ConsoleError::Config(format!(
            "service name {:?} contains illegal characters",
            name
        )));
    }
    Ok(())
}

async fn run(program: &str, args: &[&str], timeout: Duration) -> Result<(), ConsoleError> {
    tracing::info!("Executing: {} {}", program, args.join(" "));
    let child = tokio::process::Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| ConsoleError::Timeout)?
        .map_err(|e| ConsoleError::Command(format!("{}: {}", program, e)))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ConsoleError::Command(format!(
            "{} exited with {}: {}",
            program,
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )))
    }
}

pub async fn reboot() -> Result<(), ConsoleError> {
    require_root()?;
    run("reboot", &[], POWER_TIMEOUT).await
}

pub async fn shutdown() -> Result<(), ConsoleError> {
    require_root()?;
    run("shutdown", &["-h", "now"], POWER_TIMEOUT).await
}

pub async fn restart_service(name: &str) -> Result<(), ConsoleError> {
    validate_service_name(name)?;
    require_root()?;
    run("systemctl", &["restart", name], SERVICE_TIMEOUT).await
}
