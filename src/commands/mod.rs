//! CLI surface. Each group owns its subcommand enum and a `run` function;
//! [`Commands`] composes them.

pub mod domain;
pub mod firewall;
pub mod logs;
pub mod remote;
pub mod security;
pub mod server;
pub mod ssl;
pub mod user;

use anyhow::Result;
use clap::Subcommand;

use crate::{context::Context, monitor};

#[derive(Subcommand)]
pub enum Commands {
    /// Create, remove and manage virtual hosts
    #[command(subcommand)]
    Domain(domain::DomainCommand),
    /// Let's Encrypt certificates
    #[command(subcommand)]
    Ssl(ssl::SslCommand),
    /// Shell users
    #[command(subcommand)]
    User(user::UserCommand),
    /// Host health and web server services
    #[command(subcommand)]
    Server(server::ServerCommand),
    /// UFW firewall
    #[command(subcommand)]
    Firewall(firewall::FirewallCommand),
    /// Security audit and hardening
    #[command(subcommand)]
    Security(security::SecurityCommand),
    /// Per-domain access and error logs
    #[command(subcommand)]
    Logs(logs::LogsCommand),
    /// Registered SSH hosts
    #[command(subcommand)]
    Remote(remote::RemoteCommand),
    /// Live dashboard of all sites on this host
    Monitor,
}

pub async fn run(ctx: &mut Context, command: Commands) -> Result<()> {
    match command {
        Commands::Domain(cmd) => domain::run(ctx, cmd).await,
        Commands::Ssl(cmd) => ssl::run(ctx, cmd).await,
        Commands::User(cmd) => user::run(ctx, cmd).await,
        Commands::Server(cmd) => server::run(ctx, cmd).await,
        Commands::Firewall(cmd) => firewall::run(ctx, cmd).await,
        Commands::Security(cmd) => security::run(ctx, cmd).await,
        Commands::Logs(cmd) => logs::run(ctx, cmd).await,
        Commands::Remote(cmd) => remote::run(ctx, cmd).await,
        Commands::Monitor => monitor::run(ctx).await,
    }
}
