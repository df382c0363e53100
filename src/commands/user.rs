use anyhow::Result;
use clap::Subcommand;
use colored::*;
use log::info;

use crate::{context::Context, users};

#[derive(Subcommand)]
pub enum UserCommand {
    /// Regular accounts with a login shell
    List,
    Delete {
        #[arg(long)]
        user: String,
        /// Also delete the home directory
        #[arg(long)]
        remove_home: bool,
    },
}

pub async fn run(ctx: &Context, cmd: UserCommand) -> Result<()> {
    match cmd {
        UserCommand::List => {
            let entries = users::list_shell_users(&ctx.layout)?;
            if entries.is_empty() {
                info!("No shell users found");
                return Ok(());
            }

            println!("{:<20} {:<7} {:<30} {}", "USER".bold(), "UID".bold(), "HOME".bold(), "SHELL".bold());
            for entry in entries {
                println!("{:<20} {:<7} {:<30} {}", entry.name, entry.uid, entry.home, entry.shell);
            }
            Ok(())
        }
        UserCommand::Delete { user, remove_home } => {
            users::delete_user(&ctx.layout, ctx.exec(), &user, remove_home).await
        }
    }
}
