use std::time::Duration;

use anyhow::Result;
use clap::Subcommand;
use colored::*;

use crate::{
    context::Context,
    server::ServerType,
    system::{self, HealthReport},
};

#[derive(Subcommand)]
pub enum ServerCommand {
    /// Hostname, uptime, load, memory, disk and web server states
    Health,
    Restart {
        #[arg(long, value_enum)]
        server: ServerType,
    },
    Reload {
        #[arg(long, value_enum)]
        server: ServerType,
    },
    /// Restart a web server after a countdown
    ScheduleRestart {
        #[arg(long, value_enum)]
        server: ServerType,
        /// Seconds to wait
        #[arg(long, default_value_t = 10)]
        delay: u64,
    },
    /// Check that a TCP port accepts connections
    CheckPort {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long)]
        port: u16,
        /// Seconds before giving up
        #[arg(long, default_value_t = 3)]
        timeout: u64,
    },
    /// Enable NTP and resync the clock
    SyncTime,
    /// Check that mail/sendmail/msmtp is installed
    TestEmail,
}

fn print_health(report: &HealthReport) {
    let unknown = || "unknown".dimmed().to_string();

    println!(
        "{:<10} {}",
        "Host:".bold(),
        report.hostname.clone().unwrap_or_else(unknown)
    );
    println!(
        "{:<10} {}",
        "Uptime:".bold(),
        report.uptime_secs.map(system::format_duration).unwrap_or_else(unknown)
    );
    println!(
        "{:<10} {}",
        "Load:".bold(),
        report
            .load
            .map(|(one, five, fifteen)| format!("{:.2} {:.2} {:.2}", one, five, fifteen))
            .unwrap_or_else(unknown)
    );
    println!(
        "{:<10} {}",
        "Memory:".bold(),
        report
            .memory
            .map(|(used, total)| format!(
                "{} / {} MiB ({:.1}%)",
                used / 1024,
                total / 1024,
                system::percent(used, total)
            ))
            .unwrap_or_else(unknown)
    );
    println!(
        "{:<10} {}",
        "Disk:".bold(),
        report
            .disk
            .map(|(used, total)| format!(
                "{:.1} / {:.1} GiB ({:.1}%)",
                used as f64 / 1_048_576.0,
                total as f64 / 1_048_576.0,
                system::percent(used, total)
            ))
            .unwrap_or_else(unknown)
    );

    println!("{}", "Services:".bold());
    for (server, active) in &report.services {
        let state = if *active { "active".green() } else { "inactive".red() };
        println!("  {:<10} {}", server.service_name(), state);
    }
}

pub async fn run(ctx: &Context, cmd: ServerCommand) -> Result<()> {
    match cmd {
        ServerCommand::Health => {
            print_health(&system::health(ctx).await);
            Ok(())
        }
        ServerCommand::Restart { server } => system::restart(ctx, server).await,
        ServerCommand::Reload { server } => system::reload(ctx, server).await,
        ServerCommand::ScheduleRestart { server, delay } => system::schedule_restart(ctx, server, delay).await,
        ServerCommand::CheckPort { host, port, timeout } => {
            system::check_port(&host, port, Duration::from_secs(timeout)).await
        }
        ServerCommand::SyncTime => {
            let status = system::sync_time(ctx).await?;
            print!("{}", status);
            Ok(())
        }
        ServerCommand::TestEmail => {
            system::test_email()?;
            Ok(())
        }
    }
}
