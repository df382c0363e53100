//! Registry of supported web servers and the filesystem layout they share.
//!
//! Every server-specific detail (directories, service name, config text,
//! enable/disable helpers) lives behind [`WebServer`]; callers pick an
//! implementation through [`ServerType::profile`] instead of matching on names.

mod apache;
mod caddy;
mod nginx;

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{error::SiteError, shell::ShellCommand, vhost::VirtualHostSpec};

pub use apache::Apache;
pub use caddy::Caddy;
pub use nginx::Nginx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Apache,
    Nginx,
    Caddy,
}

impl ServerType {
    /// Registry order. Detection probes servers in this order.
    pub const ALL: [ServerType; 3] = [ServerType::Apache, ServerType::Nginx, ServerType::Caddy];

    pub fn profile(self) -> &'static dyn WebServer {
        match self {
            ServerType::Apache => &Apache,
            ServerType::Nginx => &Nginx,
            ServerType::Caddy => &Caddy,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ServerType::Apache => "apache",
            ServerType::Nginx => "nginx",
            ServerType::Caddy => "caddy",
        }
    }

    pub fn service_name(self) -> &'static str {
        self.profile().service_name()
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ServerType {
    type Err = SiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apache" | "apache2" => Ok(ServerType::Apache),
            "nginx" => Ok(ServerType::Nginx),
            "caddy" => Ok(ServerType::Caddy),
            _ => Err(SiteError::UnsupportedServer(s.to_string())),
        }
    }
}

/// Capabilities of one web server flavour.
pub trait WebServer: Sync {
    fn kind(&self) -> ServerType;

    fn available_dir(&self) -> &'static str;

    fn enabled_dir(&self) -> &'static str;

    /// systemd unit name.
    fn service_name(&self) -> &'static str;

    fn log_dir(&self) -> &'static str;

    fn access_log(&self, domain: &str) -> String {
        format!("{}/{}-access.log", self.log_dir(), domain)
    }

    fn error_log(&self, domain: &str) -> Option<String> {
        Some(format!("{}/{}-error.log", self.log_dir(), domain))
    }

    fn render(&self, spec: &VirtualHostSpec) -> String;

    /// Distro helper that enables a site. `None` means the controller links
    /// the config into the enabled directory itself.
    fn enable_command(&self, _filename: &str) -> Option<ShellCommand> {
        None
    }

    fn disable_command(&self, _filename: &str) -> Option<ShellCommand> {
        None
    }

    /// certbot installer plugin. `None` when the server manages TLS itself.
    fn certbot_plugin(&self) -> Option<&'static str>;
}

/// Resolves the absolute paths used by the tool against a root prefix and
/// pins the config filename suffix for every server type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    suffix: String,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            suffix: suffix.into(),
        }
    }

    /// The live system: `/` with `.conf` files.
    pub fn system() -> Self {
        Self::new("/", ".conf")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Maps an absolute system path below the root prefix.
    pub fn resolve(&self, absolute: &str) -> PathBuf {
        self.root.join(absolute.trim_start_matches('/'))
    }

    pub fn config_filename(&self, domain: &str) -> String {
        format!("{}{}", domain, self.suffix)
    }

    /// Inverse of [`Layout::config_filename`]. `None` for names that do not
    /// carry the suffix.
    pub fn domain_from_filename<'a>(&self, filename: &'a str) -> Option<&'a str> {
        let domain = filename.strip_suffix(self.suffix.as_str())?;
        if domain.is_empty() {
            None
        } else {
            Some(domain)
        }
    }

    pub fn available_dir(&self, server: ServerType) -> PathBuf {
        self.resolve(server.profile().available_dir())
    }

    pub fn enabled_dir(&self, server: ServerType) -> PathBuf {
        self.resolve(server.profile().enabled_dir())
    }

    pub fn available_path(&self, server: ServerType, domain: &str) -> PathBuf {
        self.available_dir(server).join(self.config_filename(domain))
    }

    pub fn enabled_path(&self, server: ServerType, domain: &str) -> PathBuf {
        self.enabled_dir(server).join(self.config_filename(domain))
    }

    pub fn home_dir(&self, user: &str) -> PathBuf {
        self.resolve(&format!("/home/{}", user))
    }

    pub fn public_html(&self, user: &str) -> PathBuf {
        self.home_dir(user).join("public_html")
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.resolve("/run/lock/stackroost")
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_table_matches_conventions() {
        let expected = [
            (ServerType::Apache, "/etc/apache2/sites-available", "/etc/apache2/sites-enabled", "apache2"),
            (ServerType::Nginx, "/etc/nginx/sites-available", "/etc/nginx/sites-enabled", "nginx"),
            (ServerType::Caddy, "/etc/caddy/sites-available", "/etc/caddy/sites-enabled", "caddy"),
        ];

        for (server, available, enabled, service) in expected {
            let profile = server.profile();
            assert_eq!(profile.kind(), server);
            assert_eq!(profile.available_dir(), available);
            assert_eq!(profile.enabled_dir(), enabled);
            assert_eq!(profile.service_name(), service);
        }
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Nginx".parse::<ServerType>().unwrap(), ServerType::Nginx);
        assert_eq!("apache2".parse::<ServerType>().unwrap(), ServerType::Apache);
        assert!("iis".parse::<ServerType>().is_err());
    }

    #[test]
    fn layout_resolves_under_root() {
        let layout = Layout::new("/tmp/stage", ".conf");
        assert_eq!(
            layout.available_path(ServerType::Nginx, "blog.example.com"),
            PathBuf::from("/tmp/stage/etc/nginx/sites-available/blog.example.com.conf")
        );
        assert_eq!(layout.public_html("blog"), PathBuf::from("/tmp/stage/home/blog/public_html"));
        assert_eq!(
            Layout::system().enabled_path(ServerType::Apache, "a.io"),
            PathBuf::from("/etc/apache2/sites-enabled/a.io.conf")
        );
    }

    #[test]
    fn filename_round_trip_respects_suffix() {
        let layout = Layout::new("/", ".conf");
        assert_eq!(layout.domain_from_filename("shop.example.com.conf"), Some("shop.example.com"));
        assert_eq!(layout.domain_from_filename("shop.example.com"), None);
        assert_eq!(layout.domain_from_filename(".conf"), None);

        let bare = Layout::new("/", "");
        assert_eq!(bare.config_filename("a.io"), "a.io");
        assert_eq!(bare.domain_from_filename("a.io"), Some("a.io"));
    }

    #[test]
    fn only_caddy_skips_certbot() {
        assert_eq!(ServerType::Apache.profile().certbot_plugin(), Some("apache"));
        assert_eq!(ServerType::Nginx.profile().certbot_plugin(), Some("nginx"));
        assert_eq!(ServerType::Caddy.profile().certbot_plugin(), None);
        assert!(ServerType::Caddy.profile().error_log("a.io").is_none());
    }
}
