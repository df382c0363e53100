use std::fs;

use anyhow::{Context as _, Result};
use log::{info, warn};
use regex::Regex;

use crate::{
    backup,
    context::Context,
    firewall, logger,
    shell::{Executor, ShellCommand},
};

const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";

/// Outcome of one hardening check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: &'static str,
    pub passed: bool,
    pub detail: &'static str,
}

impl Check {
    fn new(name: &'static str, passed: bool, good: &'static str, bad: &'static str) -> Self {
        Self {
            name,
            passed,
            detail: if passed { good } else { bad },
        }
    }
}

/// Active value of an sshd option. Commented lines are ignored and the
/// first occurrence wins, as sshd itself does.
pub fn sshd_option(content: &str, key: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let name = parts.next()?;
        if name.eq_ignore_ascii_case(key) {
            parts.next().map(str::to_string)
        } else {
            None
        }
    })
}

/// Sets `key value` in sshd_config content.
///
/// Every line carrying the option, commented out or not, is replaced. When
/// the option is absent it is appended.
pub fn set_sshd_option(content: &str, key: &str, value: &str) -> Result<String> {
    let pattern = Regex::new(&format!(r"(?mi)^[ \t]*#*[ \t]*{}\b.*$", regex::escape(key)))?;
    let line = format!("{} {}", key, value);

    if pattern.is_match(content) {
        return Ok(pattern.replace_all(content, regex::NoExpand(&line)).into_owned());
    }

    let mut updated = content.to_string();
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&line);
    updated.push('\n');
    Ok(updated)
}

async fn service_active(exec: &dyn Executor, service: &str) -> bool {
    exec.capture(&ShellCommand::new("systemctl").args(["is-active", service]))
        .await
        .trim()
        == "active"
}

/// Runs the basic server security checks.
pub async fn check(ctx: &Context) -> Result<Vec<Check>> {
    let exec = ctx.exec();
    let sshd_path = ctx.layout.resolve(SSHD_CONFIG);
    let sshd = match fs::read_to_string(&sshd_path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Cannot read {:?}: {}", sshd_path, e);
            String::new()
        }
    };

    let ufw_status = exec.capture(&ShellCommand::root("ufw", ["status"])).await;

    Ok(vec![
        Check::new(
            "SSH service",
            service_active(exec, "ssh").await,
            "Active",
            "Inactive or not installed",
        ),
        Check::new(
            "SSH root login",
            sshd_option(&sshd, "PermitRootLogin").as_deref() == Some("no"),
            "Disabled",
            "Possibly enabled (check PermitRootLogin)",
        ),
        Check::new(
            "Password authentication",
            sshd_option(&sshd, "PasswordAuthentication").as_deref() == Some("no"),
            "Disabled (good)",
            "Enabled (not recommended)",
        ),
        Check::new(
            "Firewall (UFW)",
            firewall::is_active(&ufw_status),
            "Active",
            "Inactive or not installed",
        ),
        Check::new(
            "Fail2ban",
            service_active(exec, "fail2ban").await,
            "Running",
            "Not active or not installed",
        ),
    ])
}

#[derive(Debug, Clone, Default)]
pub struct HardeningOptions {
    pub allow_ports: Vec<u16>,
    pub disable_root_login: bool,
    pub enforce_key_only: bool,
}

/// Firewall defaults plus optional SSH hardening.
pub async fn secure(ctx: &Context, opts: &HardeningOptions) -> Result<()> {
    info!("Starting server hardening...");
    let exec = ctx.exec();

    let ports = if opts.allow_ports.is_empty() {
        ctx.settings.allowed_ports.clone()
    } else {
        opts.allow_ports.clone()
    };

    exec.run_checked(&ShellCommand::root("ufw", ["default", "deny", "incoming"]))
        .await?;
    exec.run_checked(&ShellCommand::root("ufw", ["default", "allow", "outgoing"]))
        .await?;
    for port in &ports {
        exec.run_checked(&ShellCommand::root("ufw", ["allow".to_string(), port.to_string()]))
            .await?;
        logger::success(&format!("Allowed port: {}", port));
    }
    exec.run_checked(&ShellCommand::root("ufw", ["--force", "enable"]))
        .await
        .context("Failed to enable UFW")?;

    if opts.disable_root_login || opts.enforce_key_only {
        let path = ctx.layout.resolve(SSHD_CONFIG);
        let mut content =
            fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
        backup::backup_file(&path)?;

        if opts.disable_root_login {
            content = set_sshd_option(&content, "PermitRootLogin", "no")?;
            logger::success("Root login disabled in SSH config");
        }
        if opts.enforce_key_only {
            content = set_sshd_option(&content, "PasswordAuthentication", "no")?;
            logger::success("PasswordAuthentication disabled, key-based auth enforced");
        }

        fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;

        exec.run_checked(&ShellCommand::root("systemctl", ["restart", "ssh"]))
            .await
            .context("Failed to restart ssh")?;
    }

    logger::success("Server hardening completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SSHD: &str = "\
# Authentication:
#PermitRootLogin prohibit-password
PasswordAuthentication yes
UsePAM yes
";

    #[test]
    fn reads_only_active_options() {
        assert_eq!(sshd_option(SSHD, "PermitRootLogin"), None);
        assert_eq!(sshd_option(SSHD, "passwordauthentication").as_deref(), Some("yes"));
    }

    #[test]
    fn replaces_commented_and_active_lines() {
        let updated = set_sshd_option(SSHD, "PermitRootLogin", "no").unwrap();
        let updated = set_sshd_option(&updated, "PasswordAuthentication", "no").unwrap();
        assert_eq!(
            updated,
            "# Authentication:\nPermitRootLogin no\nPasswordAuthentication no\nUsePAM yes\n"
        );
    }

    #[test]
    fn appends_missing_option() {
        let updated = set_sshd_option("UsePAM yes", "PermitRootLogin", "no").unwrap();
        assert_eq!(updated, "UsePAM yes\nPermitRootLogin no\n");
    }

    #[test]
    fn unrelated_lines_are_kept() {
        let updated = set_sshd_option(SSHD, "UsePAM", "no").unwrap();
        assert!(updated.starts_with("# Authentication:\n"));
        assert!(updated.ends_with("UsePAM no\n"));
    }
}
