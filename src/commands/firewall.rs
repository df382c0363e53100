use anyhow::Result;
use clap::Subcommand;

use crate::{context::Context, firewall};

#[derive(Subcommand)]
pub enum FirewallCommand {
    /// Install UFW, open the allowed ports and enable it
    Enable {
        /// Extra port to open, may be repeated
        #[arg(long = "port")]
        ports: Vec<u16>,
    },
    Disable {
        /// Reset all rules as well
        #[arg(long)]
        flush: bool,
    },
}

pub async fn run(ctx: &Context, cmd: FirewallCommand) -> Result<()> {
    match cmd {
        FirewallCommand::Enable { ports } => firewall::enable(ctx, &ports).await,
        FirewallCommand::Disable { flush } => firewall::disable(ctx, flush).await,
    }
}
