use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::*;
use log::info;

use crate::{context::Context, remote};

#[derive(Subcommand)]
pub enum RemoteCommand {
    /// Register a host reachable with public key authentication
    Add {
        name: String,
        /// Target as user@host
        user_host: String,
        /// Private key file
        #[arg(long)]
        key: PathBuf,
        #[arg(long, default_value_t = 22)]
        port: u16,
    },
    List,
    /// Run a command on a registered host
    Exec {
        name: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

pub async fn run(ctx: &mut Context, cmd: RemoteCommand) -> Result<()> {
    match cmd {
        RemoteCommand::Add {
            name,
            user_host,
            key,
            port,
        } => remote::add(ctx, &name, &user_host, key, port),
        RemoteCommand::List => {
            if ctx.settings.remotes.is_empty() {
                info!("No remotes registered");
                return Ok(());
            }
            for (name, host) in &ctx.settings.remotes {
                println!(
                    "{:<16} {}:{} (key {})",
                    name.bold(),
                    host.user_host,
                    host.port,
                    host.key.display()
                );
            }
            Ok(())
        }
        RemoteCommand::Exec { name, command } => {
            let output = remote::exec(ctx, &name, &command.join(" ")).await?;
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);

            if output.exit_status != 0 {
                bail!("Remote command exited with status {}", output.exit_status);
            }
            Ok(())
        }
    }
}
