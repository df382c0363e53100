use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised by the site model: templates, detection, state control and the shell executor.
#[derive(Error, Debug)]
pub enum SiteError {
    #[error("invalid domain name '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: &'static str },
    #[error("invalid port '{0}': expected a number between 1 and 65535")]
    InvalidPort(String),
    #[error("unsupported server type: {0} (use apache, nginx or caddy)")]
    UnsupportedServer(String),
    #[error("could not detect server type for {0} (no config found)")]
    NotDetected(String),
    #[error("config already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("config not found: {}", .0.display())]
    ConfigMissing(PathBuf),
    #[error("another operation on {0} is in progress")]
    Busy(String),
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("command `{command}` failed: {output}")]
    CommandFailed { command: String, output: String },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SiteError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
