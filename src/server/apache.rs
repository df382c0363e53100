use super::{ServerType, WebServer};
use crate::{shell::ShellCommand, vhost::VirtualHostSpec};

pub struct Apache;

impl WebServer for Apache {
    fn kind(&self) -> ServerType {
        ServerType::Apache
    }

    fn available_dir(&self) -> &'static str {
        "/etc/apache2/sites-available"
    }

    fn enabled_dir(&self) -> &'static str {
        "/etc/apache2/sites-enabled"
    }

    fn service_name(&self) -> &'static str {
        "apache2"
    }

    fn log_dir(&self) -> &'static str {
        "/var/log/apache2"
    }

    /// `<VirtualHost>` block serving `/home/<user>/public_html`.
    fn render(&self, spec: &VirtualHostSpec) -> String {
        format!(
            r#"<VirtualHost *:{port}>
    ServerName {domain}
    ServerAlias www.{domain}
    DocumentRoot /home/{user}/public_html
    ErrorLog ${{APACHE_LOG_DIR}}/{domain}-error.log
    CustomLog ${{APACHE_LOG_DIR}}/{domain}-access.log combined
    <Directory /home/{user}/public_html>
        Options Indexes FollowSymLinks
        AllowOverride All
        Require all granted
    </Directory>
</VirtualHost>
"#,
            port = spec.port,
            domain = spec.domain,
            user = spec.username
        )
    }

    fn enable_command(&self, filename: &str) -> Option<ShellCommand> {
        Some(ShellCommand::root("a2ensite", [filename]))
    }

    fn disable_command(&self, filename: &str) -> Option<ShellCommand> {
        Some(ShellCommand::root("a2dissite", [filename]))
    }

    fn certbot_plugin(&self) -> Option<&'static str> {
        Some("apache")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_server_name_and_document_root() {
        let spec = VirtualHostSpec::new("blog.example.com", "80").unwrap();
        let conf = Apache.render(&spec);

        assert!(conf.starts_with("<VirtualHost *:80>\n"));
        assert!(conf.contains("ServerName blog.example.com"));
        assert!(conf.contains("ServerAlias www.blog.example.com"));
        assert!(conf.contains("DocumentRoot /home/blog/public_html"));
        assert!(conf.contains("ErrorLog ${APACHE_LOG_DIR}/blog.example.com-error.log"));
        assert!(conf.contains("<Directory /home/blog/public_html>"));
        assert!(conf.trim_end().ends_with("</VirtualHost>"));
    }

    #[test]
    fn enable_goes_through_a2ensite() {
        let cmd = Apache.enable_command("blog.example.com.conf").unwrap();
        assert_eq!(cmd.to_string(), "a2ensite blog.example.com.conf");
        assert!(cmd.privileged);
        assert_eq!(
            Apache.disable_command("blog.example.com.conf").unwrap().to_string(),
            "a2dissite blog.example.com.conf"
        );
    }
}
