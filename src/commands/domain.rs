use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use log::info;

use crate::{
    backup::{self, ArchiveFormat},
    context::Context,
    domain::{self, CloneOptions, CreateOptions, DomainStatus, RemoveOptions},
    inventory::{self, DomainRecord, InventoryFilter},
    logger,
    server::ServerType,
    site::{SiteState, Transition},
    ssl::CertificateStatus,
    vhost::validate_domain,
};

#[derive(Subcommand)]
pub enum DomainCommand {
    /// Create a site: user, document root, config, optional database and SSL
    Create {
        #[arg(long)]
        domain: String,
        /// Defaults to `default_server` from the settings file
        #[arg(long, value_enum)]
        server: Option<ServerType>,
        /// Defaults to `default_port` from the settings file
        #[arg(long)]
        port: Option<String>,
        /// Also create a MySQL user and database
        #[arg(long)]
        with_db: bool,
        /// Request a Let's Encrypt certificate after enabling
        #[arg(long)]
        ssl: bool,
    },
    /// Remove a site, its database and its shell user
    Remove {
        #[arg(long)]
        domain: String,
        #[arg(long, value_enum)]
        server: Option<ServerType>,
        #[arg(long)]
        keep_user: bool,
        #[arg(long)]
        keep_db: bool,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Copy a site to a new domain
    Clone {
        #[arg(long)]
        source: String,
        #[arg(long)]
        target: String,
        #[arg(long)]
        clone_db: bool,
        #[arg(long)]
        clone_user: bool,
    },
    /// Replace the `:80` binding in a site config with another port
    UpdatePort {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        port: String,
    },
    Enable {
        #[arg(long)]
        domain: String,
        #[arg(long, value_enum)]
        server: Option<ServerType>,
    },
    Disable {
        #[arg(long)]
        domain: String,
        #[arg(long, value_enum)]
        server: Option<ServerType>,
    },
    /// Enable a disabled site or disable an enabled one
    Toggle {
        #[arg(long)]
        domain: String,
        #[arg(long, value_enum)]
        server: Option<ServerType>,
    },
    /// List sites across all servers
    List {
        #[arg(long, value_enum)]
        server: Option<ServerType>,
        #[arg(long, conflicts_with = "disabled")]
        enabled: bool,
        #[arg(long)]
        disabled: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show server, link state, user, document root and SSL of a site
    Status {
        #[arg(long)]
        domain: String,
    },
    /// Print the config file of a site
    Inspect {
        #[arg(long)]
        domain: String,
        #[arg(long, value_enum)]
        server: Option<ServerType>,
    },
    /// Archive the document root and database of a site
    Backup {
        #[arg(long)]
        domain: String,
        #[arg(long, value_enum, default_value = "tar.gz")]
        format: ArchiveFormat,
    },
    /// Restore a site from an archive made by `backup`
    Restore {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        file: PathBuf,
    },
}

fn report(domain: &str, transition: Transition) {
    match transition {
        Transition::Changed(state) => logger::success(&format!("{} is now {}", domain, state)),
        Transition::Unchanged(state) => info!("{} is already {}, nothing to do", domain, state),
    }
}

fn print_records(records: &[DomainRecord]) {
    if records.is_empty() {
        info!("No domains found");
        return;
    }

    println!("{:<40} {:<8} {:<10} {}", "DOMAIN".bold(), "SERVER".bold(), "STATE".bold(), "USER".bold());
    for record in records {
        let state = if record.enabled {
            SiteState::Enabled.to_string().green()
        } else {
            SiteState::Disabled.to_string().red()
        };
        println!("{:<40} {:<8} {:<10} {}", record.domain, record.server, state, record.user);
    }
}

fn print_status(status: &DomainStatus) {
    let yes_no = |b: bool| if b { "yes".green() } else { "no".red() };

    println!("{:<14} {}", "Domain:".bold(), status.domain);
    match status.server {
        Some(server) => println!("{:<14} {}", "Server:".bold(), server),
        None => println!("{:<14} {}", "Server:".bold(), "not detected".yellow()),
    }
    let state = match status.state {
        SiteState::Enabled => status.state.to_string().green(),
        SiteState::Disabled => status.state.to_string().red(),
    };
    println!("{:<14} {}", "State:".bold(), state);
    println!("{:<14} {} (exists: {})", "User:".bold(), status.user, yes_no(status.user_exists));
    println!(
        "{:<14} {} (exists: {})",
        "Public HTML:".bold(),
        status.public_html.display(),
        yes_no(status.public_html_exists)
    );

    let certificate = match &status.certificate {
        Some(CertificateStatus::Automatic) => "managed automatically by Caddy".cyan(),
        Some(CertificateStatus::Installed) => "installed".green(),
        Some(CertificateStatus::NotFound) => "not found".yellow(),
        None => "unknown".dimmed(),
    };
    println!("{:<14} {}", "SSL:".bold(), certificate);
}

pub async fn run(ctx: &Context, cmd: DomainCommand) -> Result<()> {
    match cmd {
        DomainCommand::Create {
            domain,
            server,
            port,
            with_db,
            ssl,
        } => {
            let opts = CreateOptions {
                domain,
                server: server.unwrap_or(ctx.settings.default_server),
                port: port.unwrap_or_else(|| ctx.settings.default_port.clone()),
                with_db,
                ssl,
            };
            domain::create(ctx, &opts).await
        }
        DomainCommand::Remove {
            domain,
            server,
            keep_user,
            keep_db,
            yes,
        } => {
            let opts = RemoveOptions {
                domain,
                server,
                keep_user,
                keep_db,
                assume_yes: yes,
            };
            domain::remove(ctx, &opts).await
        }
        DomainCommand::Clone {
            source,
            target,
            clone_db,
            clone_user,
        } => {
            let opts = CloneOptions {
                source,
                target,
                clone_db,
                clone_user,
            };
            domain::clone(ctx, &opts).await
        }
        DomainCommand::UpdatePort { domain, port } => domain::update_port(ctx, &domain, &port).await,
        DomainCommand::Enable { domain, server } => {
            validate_domain(&domain)?;
            let server = domain::resolve_server(ctx, &domain, server)?;
            report(&domain, ctx.controller().enable(server, &domain).await?);
            Ok(())
        }
        DomainCommand::Disable { domain, server } => {
            validate_domain(&domain)?;
            let server = domain::resolve_server(ctx, &domain, server)?;
            report(&domain, ctx.controller().disable(server, &domain).await?);
            Ok(())
        }
        DomainCommand::Toggle { domain, server } => {
            validate_domain(&domain)?;
            let server = domain::resolve_server(ctx, &domain, server)?;
            report(&domain, ctx.controller().toggle(server, &domain).await?);
            Ok(())
        }
        DomainCommand::List {
            server,
            enabled,
            disabled,
            json,
        } => {
            let filter = InventoryFilter {
                server,
                only_enabled: enabled,
                only_disabled: disabled,
                hide_system: false,
            };
            let mut records = inventory::list(&ctx.layout, &filter);
            records.sort_by(|a, b| (a.server, &a.domain).cmp(&(b.server, &b.domain)));

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_records(&records);
            }
            Ok(())
        }
        DomainCommand::Status { domain } => {
            let status = domain::status(ctx, &domain).await?;
            print_status(&status);
            Ok(())
        }
        DomainCommand::Inspect { domain, server } => {
            let (path, content) = domain::inspect(ctx, &domain, server)?;
            info!("Config file: {:?}", path);
            print!("{}", content);
            if !content.ends_with('\n') {
                println!();
            }
            Ok(())
        }
        DomainCommand::Backup { domain, format } => {
            backup::backup_domain(ctx, &domain, format).await?;
            Ok(())
        }
        DomainCommand::Restore { domain, file } => backup::restore_domain(ctx, &domain, &file).await,
    }
}
