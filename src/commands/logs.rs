use anyhow::Result;
use clap::Subcommand;
use colored::*;
use log::info;

use crate::{context::Context, logs};

#[derive(Subcommand)]
pub enum LogsCommand {
    /// Tail the access and error logs of a domain
    View {
        #[arg(long)]
        domain: String,
        #[arg(long, default_value_t = 50)]
        lines: usize,
    },
    /// Delete the log files of a domain
    Purge {
        #[arg(long)]
        domain: String,
    },
    /// Top client addresses and URLs from the access log
    Analyze {
        #[arg(long)]
        domain: String,
        /// Number of trailing lines to scan
        #[arg(long, default_value_t = 1000)]
        lines: usize,
    },
}

fn print_top(title: &str, entries: &[(String, usize)]) {
    println!("{}", title.bold());
    if entries.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for (key, count) in entries {
        println!("  {:>6}  {}", count, key);
    }
}

pub async fn run(ctx: &Context, cmd: LogsCommand) -> Result<()> {
    match cmd {
        LogsCommand::View { domain, lines } => logs::view(ctx, &domain, lines).await,
        LogsCommand::Purge { domain } => logs::purge(ctx, &domain).await,
        LogsCommand::Analyze { domain, lines } => {
            let report = logs::analyze(ctx, &domain, lines)?;
            info!("{} requests in the last {} lines", report.requests, lines);
            print_top("Top IPs:", &report.top_ips);
            print_top("Top URLs:", &report.top_urls);
            Ok(())
        }
    }
}
