use log::warn;

use crate::{
    error::SiteError,
    server::{Layout, ServerType},
};

/// Every server type with a config file for `domain` in its available directory.
pub fn owners(layout: &Layout, domain: &str) -> Vec<ServerType> {
    ServerType::ALL
        .into_iter()
        .filter(|&server| layout.available_path(server, domain).is_file())
        .collect()
}

/// Finds the server type owning `domain`.
///
/// Servers are probed in registry order (apache, nginx, caddy) and the first
/// match wins. Owning the same domain twice is a broken setup and is only
/// reported as a warning.
pub fn detect(layout: &Layout, domain: &str) -> Result<ServerType, SiteError> {
    let found = owners(layout, domain);

    match found.as_slice() {
        [] => Err(SiteError::NotDetected(domain.to_string())),
        [single] => Ok(*single),
        [first, ..] => {
            let names: Vec<&str> = found.iter().map(|s| s.name()).collect();
            warn!(
                "{} has a config under several servers ({}), using {}",
                domain,
                names.join(", "),
                first
            );
            Ok(*first)
        }
    }
}
