use crate::{error::SiteError, server::ServerType};

/// Input of the config template generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualHostSpec {
    pub domain: String,
    pub port: String,
    pub username: String,
}

impl VirtualHostSpec {
    /// Validates domain and port and derives the owning user from the domain.
    ///
    /// # Examples
    /// ```rust
    /// use stackroost::vhost::VirtualHostSpec;
    ///
    /// let spec = VirtualHostSpec::new("blog.example.com", "80").unwrap();
    /// assert_eq!(spec.username, "blog");
    /// ```
    pub fn new(domain: &str, port: &str) -> Result<Self, SiteError> {
        validate_domain(domain)?;
        validate_port(port)?;

        Ok(Self {
            domain: domain.to_string(),
            port: port.to_string(),
            username: username_for(domain).to_string(),
        })
    }
}

/// The shell user owning a domain: everything before the first dot.
pub fn username_for(domain: &str) -> &str {
    domain.split('.').next().unwrap_or(domain)
}

pub fn validate_domain(domain: &str) -> Result<(), SiteError> {
    let invalid = |reason| SiteError::InvalidDomain {
        domain: domain.to_string(),
        reason,
    };

    if domain.is_empty() {
        return Err(invalid("domain is empty"));
    }
    if domain.len() > 253 {
        return Err(invalid("longer than 253 characters"));
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid("expected at least two dot-separated labels"));
    }

    for label in labels {
        if label.is_empty() {
            return Err(invalid("empty label"));
        }
        if label.len() > 63 {
            return Err(invalid("label longer than 63 characters"));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid("only letters, digits and '-' are allowed"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid("label starts or ends with '-'"));
        }
    }

    Ok(())
}

pub fn validate_port(port: &str) -> Result<u16, SiteError> {
    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(SiteError::InvalidPort(port.to_string())),
    }
}

/// Renders the site configuration for a server type. Pure.
pub fn generate(server: ServerType, spec: &VirtualHostSpec) -> String {
    server.profile().render(spec)
}

/// Same as [`generate`], for a server name coming from user input.
pub fn generate_named(server: &str, spec: &VirtualHostSpec) -> Result<String, SiteError> {
    let server: ServerType = server.parse()?;
    Ok(generate(server, spec))
}
