use super::{ServerType, WebServer};
use crate::vhost::VirtualHostSpec;

pub struct Nginx;

impl WebServer for Nginx {
    fn kind(&self) -> ServerType {
        ServerType::Nginx
    }

    fn available_dir(&self) -> &'static str {
        "/etc/nginx/sites-available"
    }

    fn enabled_dir(&self) -> &'static str {
        "/etc/nginx/sites-enabled"
    }

    fn service_name(&self) -> &'static str {
        "nginx"
    }

    fn log_dir(&self) -> &'static str {
        "/var/log/nginx"
    }

    /// `server` block with PHP-FPM passthrough and a deny rule for dotfiles.
    fn render(&self, spec: &VirtualHostSpec) -> String {
        format!(
            r#"server {{
    listen {port};
    server_name {domain} www.{domain};

    root /home/{user}/public_html;
    index index.html index.htm index.php;

    access_log /var/log/nginx/{domain}-access.log;
    error_log /var/log/nginx/{domain}-error.log;

    location / {{
        try_files $uri $uri/ =404;
    }}

    location ~ \.php$ {{
        include snippets/fastcgi-php.conf;
        fastcgi_pass unix:/run/php/php8.1-fpm.sock;
    }}

    location ~ /\.ht {{
        deny all;
    }}
}}
"#,
            port = spec.port,
            domain = spec.domain,
            user = spec.username
        )
    }

    fn certbot_plugin(&self) -> Option<&'static str> {
        Some("nginx")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_listen_root_and_php_passthrough() {
        let spec = VirtualHostSpec::new("shop.example.com", "8080").unwrap();
        let conf = Nginx.render(&spec);

        assert!(conf.contains("    listen 8080;\n"));
        assert!(conf.contains("server_name shop.example.com www.shop.example.com;"));
        assert!(conf.contains("root /home/shop/public_html;"));
        assert!(conf.contains("fastcgi_pass unix:/run/php/php8.1-fpm.sock;"));
        assert!(conf.contains("location ~ /\\.ht {\n        deny all;"));
        assert!(conf.contains("access_log /var/log/nginx/shop.example.com-access.log;"));
    }

    #[test]
    fn links_instead_of_running_a_helper() {
        assert!(Nginx.enable_command("a.io.conf").is_none());
        assert!(Nginx.disable_command("a.io.conf").is_none());
    }
}
