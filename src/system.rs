use std::{
    env,
    ffi::OsStr,
    fs,
    os::unix::fs::PermissionsExt,
    path::Path,
    time::Duration,
};

use anyhow::{bail, Context as _, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use tokio::{net::TcpStream, time};

use crate::{
    context::Context,
    logger,
    server::ServerType,
    shell::{Executor, ShellCommand},
};

/// Snapshot of host resources and web server states.
#[derive(Debug, Clone, Default)]
pub struct HealthReport {
    pub hostname: Option<String>,
    pub uptime_secs: Option<u64>,
    pub load: Option<(f64, f64, f64)>,
    /// Used and total memory in KiB.
    pub memory: Option<(u64, u64)>,
    /// Used and total disk space in KiB.
    pub disk: Option<(u64, u64)>,
    pub services: Vec<(ServerType, bool)>,
}

/// Seconds since boot from the content of `/proc/uptime`.
pub fn parse_uptime(content: &str) -> Option<u64> {
    let secs: f64 = content.split_whitespace().next()?.parse().ok()?;
    Some(secs as u64)
}

/// Human readable duration: `3d 4h 5m`.
pub fn format_duration(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = secs % 86_400 / 3_600;
    let minutes = secs % 3_600 / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

pub fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

fn ok_or_warn<T, E: std::fmt::Display>(what: &str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{} unavailable: {}", what, e);
            None
        }
    }
}

async fn service_active(exec: &dyn Executor, service: &str) -> bool {
    exec.capture(&ShellCommand::new("systemctl").args(["is-active", service]))
        .await
        .trim()
        == "active"
}

pub async fn health(ctx: &Context) -> HealthReport {
    let uptime = fs::read_to_string("/proc/uptime")
        .ok()
        .and_then(|content| parse_uptime(&content));

    let mut services = Vec::new();
    for server in ServerType::ALL {
        services.push((server, service_active(ctx.exec(), server.service_name()).await));
    }

    HealthReport {
        hostname: ok_or_warn("Hostname", sys_info::hostname()),
        uptime_secs: uptime,
        load: ok_or_warn("Load average", sys_info::loadavg()).map(|l| (l.one, l.five, l.fifteen)),
        memory: ok_or_warn("Memory info", sys_info::mem_info())
            .map(|m| (m.total.saturating_sub(m.avail), m.total)),
        disk: ok_or_warn("Disk info", sys_info::disk_info())
            .map(|d| (d.total.saturating_sub(d.free), d.total)),
        services,
    }
}

pub async fn restart(ctx: &Context, server: ServerType) -> Result<()> {
    info!("Restarting {} server...", server);
    ctx.exec()
        .run_checked(&ShellCommand::root("systemctl", ["restart", server.service_name()]))
        .await
        .with_context(|| format!("Failed to restart {}", server))?;

    logger::success(&format!("{} restarted", server.service_name()));
    Ok(())
}

/// Explicit reload; unlike the reload after a site change, failure is an error.
pub async fn reload(ctx: &Context, server: ServerType) -> Result<()> {
    info!("Reloading {} configuration...", server);
    ctx.exec()
        .run_checked(&ShellCommand::root("systemctl", ["reload", server.service_name()]))
        .await
        .with_context(|| format!("Failed to reload {}", server))?;

    logger::success(&format!("{} reloaded", server.service_name()));
    Ok(())
}

/// Counts down `delay` seconds with a progress bar, then restarts.
pub async fn schedule_restart(ctx: &Context, server: ServerType, delay: u64) -> Result<()> {
    info!("Restart of {} scheduled in {} seconds...", server, delay);

    let pb = ProgressBar::new(delay);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len}s {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message(format!("restarting {}", server.service_name()));

    for _ in 0..delay {
        time::sleep(Duration::from_secs(1)).await;
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!("Restarting now...");
    restart(ctx, server).await
}

/// Opens a TCP connection to `host:port` within `timeout`.
pub async fn check_port(host: &str, port: u16, timeout: Duration) -> Result<()> {
    info!("Checking port {} on {}...", port, host);

    match time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => {
            logger::success(&format!("Port {} is open and reachable on {}", port, host));
            Ok(())
        }
        Ok(Err(e)) => bail!("Port {} is not reachable on {}: {}", port, host, e),
        Err(_) => bail!(
            "Port {} is not reachable on {}: timed out after {}s",
            port,
            host,
            timeout.as_secs()
        ),
    }
}

/// Enables NTP and restarts systemd-timesyncd. Returns `timedatectl status`.
pub async fn sync_time(ctx: &Context) -> Result<String> {
    info!("Enabling NTP time sync...");
    ctx.exec()
        .run_checked(&ShellCommand::root("timedatectl", ["set-ntp", "true"]))
        .await
        .context("Failed to enable NTP sync")?;

    info!("Restarting time sync service...");
    ctx.exec()
        .run_checked(&ShellCommand::root("systemctl", ["restart", "systemd-timesyncd"]))
        .await
        .context("Failed to restart timesync service")?;

    logger::success("Time synchronization triggered");
    let status = ctx.exec().capture(&ShellCommand::new("timedatectl").arg("status")).await;
    Ok(status)
}

/// Mail utilities that can send from this host.
pub const MAILERS: [&str; 3] = ["mail", "sendmail", "msmtp"];

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Mailers found in the directories of a `PATH` value.
pub fn find_mailers(path: &OsStr) -> Vec<&'static str> {
    MAILERS
        .into_iter()
        .filter(|bin| env::split_paths(path).any(|dir| is_executable(&dir.join(bin))))
        .collect()
}

/// Checks that at least one mailer is installed.
pub fn test_email() -> Result<Vec<&'static str>> {
    let path = env::var_os("PATH").unwrap_or_default();
    let found = find_mailers(&path);

    if found.is_empty() {
        info!("You can install one, e.g. `sudo apt install mailutils` or `sendmail`");
        bail!("No mail sending utilities found (mail/sendmail/msmtp)");
    }

    for bin in &found {
        logger::success(&format!("Mailer available: {}", bin));
    }
    info!("Email sending capability appears to be available");
    Ok(found)
}
