use anyhow::{bail, Result};
use clap::Subcommand;
use colored::*;

use crate::{
    context::Context,
    domain::resolve_server,
    logger,
    server::ServerType,
    ssl,
    vhost::validate_domain,
};

#[derive(Subcommand)]
pub enum SslCommand {
    /// Request a certificate for a domain and its www alias
    Enable {
        #[arg(long)]
        domain: String,
        #[arg(long, value_enum)]
        server: Option<ServerType>,
    },
    /// Delete the certificate of a domain
    Disable {
        #[arg(long)]
        domain: String,
        #[arg(long, value_enum)]
        server: Option<ServerType>,
    },
    /// Renew one certificate, or all of them with --all
    Renew {
        #[arg(long, required_unless_present = "all")]
        domain: Option<String>,
        #[arg(long, value_enum)]
        server: Option<ServerType>,
        #[arg(long, conflicts_with = "domain")]
        all: bool,
        #[arg(long)]
        force: bool,
    },
    /// Days until the served certificate expires
    Expiry {
        #[arg(long)]
        domain: String,
        #[arg(long, default_value_t = 443)]
        port: u16,
    },
    /// Handshake with the domain and show the served certificate
    Test {
        #[arg(long)]
        domain: String,
        #[arg(long, default_value_t = 443)]
        port: u16,
    },
}

pub async fn run(ctx: &Context, cmd: SslCommand) -> Result<()> {
    match cmd {
        SslCommand::Enable { domain, server } => {
            validate_domain(&domain)?;
            let server = resolve_server(ctx, &domain, server)?;
            ssl::issue(ctx, server, &domain, false).await
        }
        SslCommand::Disable { domain, server } => {
            validate_domain(&domain)?;
            let server = resolve_server(ctx, &domain, server)?;
            ssl::remove(ctx, server, &domain).await
        }
        SslCommand::Renew {
            domain,
            server,
            all,
            force,
        } => {
            if all {
                return ssl::renew_all(ctx).await;
            }
            let domain = match domain {
                Some(domain) => domain,
                None => bail!("--domain or --all is required"),
            };
            validate_domain(&domain)?;
            let server = resolve_server(ctx, &domain, server)?;
            ssl::issue(ctx, server, &domain, force).await
        }
        SslCommand::Expiry { domain, port } => {
            validate_domain(&domain)?;
            ssl::check_expiry(ctx, &domain, port).await?;
            Ok(())
        }
        SslCommand::Test { domain, port } => {
            validate_domain(&domain)?;
            let info = ssl::probe(&domain, port).await?;

            logger::success(&format!("TLS handshake with {}:{} succeeded", domain, port));
            println!("{:<12} {}", "Issuer:".bold(), info.issuer);
            println!("{:<12} {}", "Valid from:".bold(), info.not_before);
            println!("{:<12} {}", "Valid until:".bold(), info.not_after);
            let days = if info.expires_within(ctx.settings.expiry_warning_days) {
                info.days_left.to_string().yellow()
            } else {
                info.days_left.to_string().green()
            };
            println!("{:<12} {}", "Days left:".bold(), days);
            Ok(())
        }
    }
}
