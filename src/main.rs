use std::{path::PathBuf, process};

use anyhow::Result;
use clap::Parser;
use log::{debug, error};

use stackroost::{
    commands::{self, domain::DomainCommand, Commands},
    config::default_settings_path,
    context::Context,
    logger,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (default: ~/.stackroost.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Never prefix privileged commands with sudo
    #[arg(long, global = true)]
    no_sudo: bool,

    /// Debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

async fn run(cli: Cli) -> Result<()> {
    let settings_path = cli.config.unwrap_or_else(default_settings_path);
    let mut ctx = Context::load(settings_path, cli.no_sudo)?;
    debug!("Using settings from {:?}", ctx.settings_path);

    commands::run(&mut ctx, cli.command).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init(cli.verbose) {
        eprintln!("Failed to initialise logging: {}", e);
    }
    // Keep stdout clean for the dashboard and for JSON output.
    let quiet = matches!(
        cli.command,
        Commands::Monitor | Commands::Domain(DomainCommand::List { json: true, .. })
    );
    if !quiet {
        logger::banner();
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        process::exit(1);
    }
}
