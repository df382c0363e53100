use std::io::Write;

use anyhow::Result;
use chrono::Local;
use colored::*;
use env_logger::{Builder, Env};
use log::Level;

fn timestamp() -> ColoredString {
    format!("[{}]", Local::now().format("%H:%M:%S")).dimmed()
}

fn label(level: Level) -> ColoredString {
    let text = format!("{:<9}", format!("[{}]", level));
    match level {
        Level::Error => text.red().bold(),
        Level::Warn => text.yellow().bold(),
        Level::Info => text.cyan().bold(),
        Level::Debug => text.blue().bold(),
        Level::Trace => text.dimmed(),
    }
}

/// Initialises logging.
///
/// Lines look like `[12:04:51] [INFO]    message`. The level comes from
/// `RUST_LOG`, falling back to `info` (or `debug` with `verbose`).
///
/// # Examples
/// ```rust
/// stackroost::logger::init(false)?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let env = Env::default()
        .filter_or("RUST_LOG", default_level)
        .write_style_or("RUST_LOG_STYLE", "auto");

    Builder::from_env(env)
        .format(|buf, record| {
            writeln!(buf, "{} {} {}", timestamp(), label(record.level()), record.args())
        })
        .try_init()?;

    Ok(())
}

/// Logs a successfully completed step.
///
/// # Examples
/// ```rust
/// stackroost::logger::success("Site enabled");
/// ```
pub fn success(message: &str) {
    println!(
        "{} {} {}",
        timestamp(),
        format!("{:<9}", "[SUCCESS]").green().bold(),
        message
    );
}

/// Shows a generated secret once. It is never written to the log.
pub fn secret(message: &str) {
    println!(
        "{} {}",
        "[GENERATED PASSWORD]".magenta().bold(),
        message.cyan().bold()
    );
}

pub fn banner() {
    println!("{}", "\n*[{   Stackroost   }]*".cyan().bold());
    println!(
        "{}",
        "   Cross-Server CLI • Apache • Nginx • Caddy • SSL • Domains\n".white()
    );
}
