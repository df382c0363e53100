use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::server::{Layout, ServerType};

pub const SETTINGS_FILE: &str = ".stackroost.toml";

/// Default location of the settings file: `~/.stackroost.toml`.
pub fn default_settings_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/root"))
        .join(SETTINGS_FILE)
}

/// SSH target registered with `remote add`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RemoteHost {
    pub user_host: String,
    pub key: PathBuf,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
}

fn default_ssh_port() -> u16 {
    22
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Prefix for every system path the tool touches. `/` on a live host.
    pub root: PathBuf,
    /// Config filename suffix shared by all server types.
    pub site_suffix: String,
    /// Prefix privileged commands with `sudo` when not running as root.
    pub use_sudo: bool,
    pub backup_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_email: Option<String>,
    pub default_server: ServerType,
    pub default_port: String,
    pub allowed_ports: Vec<u16>,
    pub expiry_warning_days: i64,
    pub remotes: BTreeMap<String, RemoteHost>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            site_suffix: ".conf".to_string(),
            use_sudo: true,
            backup_dir: PathBuf::from("/var/backups"),
            admin_email: None,
            default_server: ServerType::Apache,
            default_port: "80".to_string(),
            allowed_ports: vec![22, 80, 443],
            expiry_warning_days: 15,
            remotes: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Reads the settings file, writing the defaults out when it does not exist yet.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("Settings file not found, creating defaults at {:?}", path);
            let settings = Self::default();
            settings.save(path)?;
            return Ok(settings);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;
        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file: {:?}", path))?;

        debug!("Settings loaded from {:?}", path);
        Ok(settings)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let contents =
            toml::to_string_pretty(self).context("Failed to serialize settings to TOML")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        fs::write(path, contents)
            .with_context(|| format!("Failed to write settings file: {:?}", path))?;

        debug!("Settings saved to {:?}", path);
        Ok(())
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.root, &self.site_suffix)
    }

    /// Backup directory resolved below the root prefix.
    pub fn backup_dir(&self) -> PathBuf {
        self.layout().resolve(&self.backup_dir.to_string_lossy())
    }
}
