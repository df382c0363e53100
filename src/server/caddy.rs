use super::{ServerType, WebServer};
use crate::vhost::VirtualHostSpec;

pub struct Caddy;

impl WebServer for Caddy {
    fn kind(&self) -> ServerType {
        ServerType::Caddy
    }

    fn available_dir(&self) -> &'static str {
        "/etc/caddy/sites-available"
    }

    fn enabled_dir(&self) -> &'static str {
        "/etc/caddy/sites-enabled"
    }

    fn service_name(&self) -> &'static str {
        "caddy"
    }

    fn log_dir(&self) -> &'static str {
        "/var/log/caddy"
    }

    // Caddy only writes the access log configured in the site block.
    fn error_log(&self, _domain: &str) -> Option<String> {
        None
    }

    fn render(&self, spec: &VirtualHostSpec) -> String {
        format!(
            r#"{domain}:{port} {{
    root * /home/{user}/public_html
    file_server
    encode gzip

    php_fastcgi unix//run/php/php8.1-fpm.sock

    log {{
        output file /var/log/caddy/{domain}-access.log
        format single_field common_log
    }}

    handle_errors {{
        respond "Something went wrong" 500
    }}
}}
"#,
            domain = spec.domain,
            port = spec.port,
            user = spec.username
        )
    }

    fn certbot_plugin(&self) -> Option<&'static str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_site_address_with_port() {
        let spec = VirtualHostSpec::new("api.example.com", "80").unwrap();
        let conf = Caddy.render(&spec);

        assert!(conf.starts_with("api.example.com:80 {\n"));
        assert!(conf.contains("root * /home/api/public_html"));
        assert!(conf.contains("encode gzip"));
        assert!(conf.contains("php_fastcgi unix//run/php/php8.1-fpm.sock"));
        assert!(conf.contains("output file /var/log/caddy/api.example.com-access.log"));
    }
}
