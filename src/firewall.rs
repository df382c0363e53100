use anyhow::{Context as _, Result};
use log::{info, warn};

use crate::{context::Context, logger, shell::ShellCommand};

/// Ports to open: the configured defaults followed by extra ones, without
/// duplicates.
pub fn ports_to_allow(defaults: &[u16], extra: &[u16]) -> Vec<u16> {
    let mut ports = Vec::new();
    for &port in defaults.iter().chain(extra) {
        if !ports.contains(&port) {
            ports.push(port);
        }
    }
    ports
}

/// ufw prints `Status: active` or `Status: inactive`; no output means it is
/// not installed.
pub fn is_active(status: &str) -> bool {
    status.lines().any(|line| line.trim() == "Status: active")
}

/// Installs and enables UFW with the allowed ports opened.
pub async fn enable(ctx: &Context, extra_ports: &[u16]) -> Result<()> {
    info!("Enabling UFW (Uncomplicated Firewall)");
    let exec = ctx.exec();

    exec.run_checked(&ShellCommand::root("apt-get", ["install", "-y", "ufw"]))
        .await
        .context("Failed to install UFW")?;

    for port in ports_to_allow(&ctx.settings.allowed_ports, extra_ports) {
        info!("Allowing port: {}", port);
        exec.run_checked(&ShellCommand::root("ufw", ["allow".to_string(), port.to_string()]))
            .await
            .with_context(|| format!("Failed to allow port {}", port))?;
    }

    exec.run_checked(&ShellCommand::root("ufw", ["--force", "enable"]))
        .await
        .context("Failed to enable UFW")?;

    info!("Firewall status:");
    exec.run(&ShellCommand::root("ufw", ["status", "verbose"]).streamed())
        .await?;

    logger::success("Firewall configured and enabled");
    Ok(())
}

pub async fn disable(ctx: &Context, flush: bool) -> Result<()> {
    info!("Checking firewall status...");
    let status = ctx.exec().capture(&ShellCommand::root("ufw", ["status"])).await;
    if !is_active(&status) {
        warn!("Firewall is already inactive");
        return Ok(());
    }

    info!("Disabling firewall (UFW)...");
    ctx.exec()
        .run_checked(&ShellCommand::root("ufw", ["disable"]))
        .await
        .context("Failed to disable firewall")?;

    if flush {
        warn!("Flushing all UFW rules...");
        ctx.exec()
            .run_checked(&ShellCommand::root("ufw", ["--force", "reset"]))
            .await
            .context("Failed to flush firewall rules")?;
        logger::success("All firewall rules flushed");
    }

    logger::success("Firewall disabled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_ports_are_appended_once() {
        assert_eq!(ports_to_allow(&[22, 80, 443], &[8080, 80, 8080]), vec![22, 80, 443, 8080]);
    }

    #[test]
    fn inactive_is_not_active() {
        assert!(is_active("Status: active\n\nTo Action From\n"));
        assert!(!is_active("Status: inactive\n"));
        assert!(!is_active(""));
    }
}
