use std::fs;

use log::{debug, warn};
use serde::Serialize;

use crate::{
    server::{Layout, ServerType},
    site,
    vhost::username_for,
};

/// Config names shipped by distributions rather than created by this tool.
const SYSTEM_PREFIXES: [&str; 3] = ["000", "default", "template"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainRecord {
    pub domain: String,
    pub server: ServerType,
    pub enabled: bool,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_usage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InventoryFilter {
    pub server: Option<ServerType>,
    pub only_enabled: bool,
    pub only_disabled: bool,
    pub hide_system: bool,
}

impl InventoryFilter {
    fn servers(&self) -> Vec<ServerType> {
        match self.server {
            Some(server) => vec![server],
            None => ServerType::ALL.to_vec(),
        }
    }
}

fn is_system_config(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    SYSTEM_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Scans the available directories and reports every site found.
///
/// Records come in directory order, per server in registry order. Callers
/// that need a stable order have to sort.
pub fn list(layout: &Layout, filter: &InventoryFilter) -> Vec<DomainRecord> {
    let mut records = Vec::new();

    for server in filter.servers() {
        let dir = layout.available_dir(server);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping {}: {:?}: {}", server, dir, e);
                continue;
            }
        };

        for entry in entries.filter_map(Result::ok) {
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
                continue;
            }

            let filename = entry.file_name().to_string_lossy().to_string();
            let domain = match layout.domain_from_filename(&filename) {
                Some(domain) => domain,
                None => {
                    debug!("Not a site config: {:?}", entry.path());
                    continue;
                }
            };

            if filter.hide_system && is_system_config(&filename) {
                continue;
            }

            let enabled = site::state(layout, server, domain).is_enabled();
            if filter.only_enabled && !enabled {
                continue;
            }
            if filter.only_disabled && enabled {
                continue;
            }

            records.push(DomainRecord {
                domain: domain.to_string(),
                server,
                enabled,
                user: username_for(domain).to_string(),
                disk_usage: None,
                last_login: None,
            });
        }
    }

    records
}
