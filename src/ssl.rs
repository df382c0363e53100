//! Let's Encrypt certificates through certbot, and a TLS probe for the
//! certificate a domain actually serves.

use std::{
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use anyhow::{anyhow, Context as _, Result};
use log::{info, warn};
use openssl::{
    asn1::Asn1Time,
    nid::Nid,
    ssl::{SslConnector, SslMethod},
    x509::X509NameRef,
};

use crate::{
    context::Context,
    logger,
    server::ServerType,
    shell::{Executor, ShellCommand},
};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// `certbot --<plugin> -d D -d www.D ...`, used for issuing and renewing.
pub fn issue_command(plugin: &str, domain: &str, email: Option<&str>, force: bool) -> ShellCommand {
    let mut cmd = ShellCommand::root(
        "certbot",
        [
            format!("--{}", plugin),
            "-d".to_string(),
            domain.to_string(),
            "-d".to_string(),
            format!("www.{}", domain),
            "--non-interactive".to_string(),
            "--agree-tos".to_string(),
        ],
    );

    cmd = match email {
        Some(email) => cmd.args(["--email", email]),
        None => cmd.arg("--register-unsafely-without-email"),
    };

    if force {
        cmd = cmd.arg("--force-renewal");
    }
    cmd
}

pub fn delete_command(domain: &str) -> ShellCommand {
    ShellCommand::root("certbot", ["delete", "--cert-name", domain, "--non-interactive"])
}

/// Requests (or renews) a certificate for `domain` on `server`.
///
/// Caddy obtains certificates on its own, so nothing runs for it.
pub async fn issue(ctx: &Context, server: ServerType, domain: &str, force: bool) -> Result<()> {
    let plugin = match server.profile().certbot_plugin() {
        Some(plugin) => plugin,
        None => {
            info!("{} manages SSL automatically, nothing to do for {}", server, domain);
            return Ok(());
        }
    };

    info!("Requesting SSL certificate for {} using Certbot", domain);
    let cmd = issue_command(plugin, domain, ctx.settings.admin_email.as_deref(), force);
    ctx.exec()
        .run_checked(&cmd.streamed())
        .await
        .with_context(|| format!("Certbot failed for {}", domain))?;

    logger::success(&format!("SSL certificate installed for {}", domain));
    Ok(())
}

pub async fn remove(ctx: &Context, server: ServerType, domain: &str) -> Result<()> {
    if server.profile().certbot_plugin().is_none() {
        info!("{} manages SSL automatically, no need to disable it manually", server);
        return Ok(());
    }

    info!("Removing SSL certificate for {} using Certbot...", domain);
    ctx.exec()
        .run_checked(&delete_command(domain))
        .await
        .with_context(|| format!("Certbot failed to delete the certificate for {}", domain))?;

    logger::success(&format!("SSL certificate removed for {}", domain));
    Ok(())
}

pub async fn renew_all(ctx: &Context) -> Result<()> {
    info!("Renewing SSL certificates for all domains");
    ctx.exec()
        .run_checked(&ShellCommand::root("certbot", ["renew"]).streamed())
        .await
        .context("SSL renewal failed")?;

    logger::success("All certificates renewed");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateStatus {
    /// Caddy obtains and renews certificates itself.
    Automatic,
    Installed,
    NotFound,
}

/// Whether certbot knows a certificate for `domain`.
pub async fn certificate_status(exec: &dyn Executor, server: ServerType, domain: &str) -> CertificateStatus {
    if server.profile().certbot_plugin().is_none() {
        return CertificateStatus::Automatic;
    }

    let out = exec
        .capture(&ShellCommand::root("certbot", ["certificates", "--cert-name", domain]))
        .await;
    if out.contains(&format!("Certificate Name: {}", domain)) {
        CertificateStatus::Installed
    } else {
        CertificateStatus::NotFound
    }
}

/// What the TLS probe learned about the served certificate.
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub issuer: String,
    pub not_before: String,
    pub not_after: String,
    pub days_left: i32,
}

impl CertificateInfo {
    pub fn expires_within(&self, days: i64) -> bool {
        i64::from(self.days_left) < days
    }
}

/// CN of an X.509 name, raw bytes decoded lossily; `unknown` when absent.
fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .map(|entry| String::from_utf8_lossy(entry.data().as_slice()).into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Connects to `domain:port`, completes a verified TLS handshake with SNI
/// and reads the leaf certificate.
pub async fn probe(domain: &str, port: u16) -> Result<CertificateInfo> {
    let domain = domain.to_string();

    tokio::task::spawn_blocking(move || -> Result<CertificateInfo> {
        let address = (domain.as_str(), port)
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve {}", domain))?
            .next()
            .ok_or_else(|| anyhow!("No address found for {}", domain))?;

        let stream = TcpStream::connect_timeout(&address, PROBE_TIMEOUT)
            .with_context(|| format!("Failed to connect to {}:{}", domain, port))?;
        stream.set_read_timeout(Some(PROBE_TIMEOUT))?;
        stream.set_write_timeout(Some(PROBE_TIMEOUT))?;

        let connector = SslConnector::builder(SslMethod::tls())?.build();
        let tls = connector
            .connect(&domain, stream)
            .map_err(|e| anyhow!("TLS handshake with {}:{} failed: {}", domain, port, e))?;

        let cert = tls
            .ssl()
            .peer_certificate()
            .ok_or_else(|| anyhow!("No SSL certificate presented by {}", domain))?;

        let issuer = common_name(cert.issuer_name());

        let now = Asn1Time::days_from_now(0)?;
        let left = now.diff(cert.not_after())?;

        Ok(CertificateInfo {
            issuer,
            not_before: cert.not_before().to_string(),
            not_after: cert.not_after().to_string(),
            days_left: left.days,
        })
    })
    .await?
}

/// Probes the certificate and warns when it expires within the configured window.
pub async fn check_expiry(ctx: &Context, domain: &str, port: u16) -> Result<CertificateInfo> {
    let info = probe(domain, port).await?;

    info!(
        "SSL for {} expires on: {} ({} days left)",
        domain, info.not_after, info.days_left
    );
    if info.expires_within(ctx.settings.expiry_warning_days) {
        warn!("SSL certificate for {} is expiring soon!", domain);
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{CommandOutput, RecordingExecutor};

    #[test]
    fn issuer_common_name_or_unknown() {
        use openssl::x509::X509NameBuilder;

        let mut builder = X509NameBuilder::new().unwrap();
        builder.append_entry_by_nid(Nid::ORGANIZATIONNAME, "Let's Encrypt").unwrap();
        builder.append_entry_by_nid(Nid::COMMONNAME, "R11").unwrap();
        let name = builder.build();
        assert_eq!(common_name(&name), "R11");

        let mut builder = X509NameBuilder::new().unwrap();
        builder.append_entry_by_nid(Nid::ORGANIZATIONNAME, "Example").unwrap();
        assert_eq!(common_name(&builder.build()), "unknown");
    }

    #[test]
    fn issue_without_email_registers_unsafely() {
        let cmd = issue_command("nginx", "blog.example.com", None, false);
        assert_eq!(
            cmd.to_string(),
            "certbot --nginx -d blog.example.com -d www.blog.example.com --non-interactive --agree-tos --register-unsafely-without-email"
        );
        assert!(cmd.privileged);
    }

    #[test]
    fn issue_with_email_and_force() {
        let cmd = issue_command("apache", "a.io", Some("ops@a.io"), true);
        assert_eq!(
            cmd.args[cmd.args.len() - 3..],
            ["--email".to_string(), "ops@a.io".to_string(), "--force-renewal".to_string()]
        );
    }

    #[test]
    fn delete_is_non_interactive() {
        assert_eq!(
            delete_command("a.io").to_string(),
            "certbot delete --cert-name a.io --non-interactive"
        );
    }

    #[tokio::test]
    async fn caddy_needs_no_certbot() {
        let exec = RecordingExecutor::new();
        assert_eq!(
            certificate_status(&exec, ServerType::Caddy, "a.io").await,
            CertificateStatus::Automatic
        );
        assert!(exec.commands().is_empty());
    }

    #[tokio::test]
    async fn certbot_listing_is_parsed() {
        let exec = RecordingExecutor::new();
        exec.respond("certbot", CommandOutput::ok("  Certificate Name: a.io\n    Domains: a.io www.a.io\n"));
        assert_eq!(
            certificate_status(&exec, ServerType::Nginx, "a.io").await,
            CertificateStatus::Installed
        );

        exec.respond("certbot", CommandOutput::ok("No certificates found.\n"));
        assert_eq!(
            certificate_status(&exec, ServerType::Apache, "a.io").await,
            CertificateStatus::NotFound
        );
    }

    #[test]
    fn expiry_window() {
        let info = CertificateInfo {
            issuer: "R3".into(),
            not_before: String::new(),
            not_after: String::new(),
            days_left: 14,
        };
        assert!(info.expires_within(15));
        assert!(!info.expires_within(14));
    }
}
