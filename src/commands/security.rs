use anyhow::Result;
use clap::Subcommand;
use colored::*;
use log::warn;

use crate::{
    context::Context,
    security::{self, HardeningOptions},
};

#[derive(Subcommand)]
pub enum SecurityCommand {
    /// Audit SSH, firewall and fail2ban
    Check,
    /// Apply firewall defaults and optional SSH hardening
    Secure {
        /// Ports to allow, defaults to `allowed_ports` from the settings file
        #[arg(long, value_delimiter = ',')]
        allow_ports: Vec<u16>,
        #[arg(long)]
        disable_root_login: bool,
        #[arg(long = "enforce-ssh-key-only")]
        enforce_key_only: bool,
    },
}

pub async fn run(ctx: &Context, cmd: SecurityCommand) -> Result<()> {
    match cmd {
        SecurityCommand::Check => {
            let checks = security::check(ctx).await?;
            for check in &checks {
                let mark = if check.passed { "✔".green() } else { "✘".red() };
                println!("{} {:<26} {}", mark, check.name, check.detail);
            }

            let failed = checks.iter().filter(|c| !c.passed).count();
            if failed > 0 {
                warn!("{} of {} checks need attention", failed, checks.len());
            }
            Ok(())
        }
        SecurityCommand::Secure {
            allow_ports,
            disable_root_login,
            enforce_key_only,
        } => {
            let opts = HardeningOptions {
                allow_ports,
                disable_root_login,
                enforce_key_only,
            };
            security::secure(ctx, &opts).await
        }
    }
}
