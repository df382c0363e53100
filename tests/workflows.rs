mod common;

use std::fs;

use stackroost::{
    backup::{self, ArchiveFormat},
    domain::{self, CloneOptions, CreateOptions, RemoveOptions},
    error::SiteError,
    server::ServerType,
    shell::CommandOutput,
    site::SiteState,
    ssl::CertificateStatus,
};

use common::{count, install_config, is_link, staged};

fn create_opts(domain: &str, server: ServerType) -> CreateOptions {
    CreateOptions {
        domain: domain.to_string(),
        server,
        port: "80".to_string(),
        with_db: false,
        ssl: false,
    }
}

#[tokio::test]
async fn create_provisions_user_root_and_link() {
    let (_dir, ctx, exec) = staged();

    domain::create(&ctx, &create_opts("blog.example.com", ServerType::Nginx))
        .await
        .unwrap();

    let config = fs::read_to_string(ctx.layout.available_path(ServerType::Nginx, "blog.example.com")).unwrap();
    assert!(config.contains("server_name blog.example.com www.blog.example.com;"));
    assert!(is_link(&ctx.layout.enabled_path(ServerType::Nginx, "blog.example.com")));
    assert!(ctx.layout.public_html("blog").join("index.html").is_file());

    let lines = exec.lines();
    assert_eq!(lines[0], "useradd -m -s /bin/bash blog");
    assert!(lines.iter().any(|l| l.starts_with("chown -R blog:blog")));
    assert_eq!(count(&lines, "systemctl reload nginx"), 1);
}

#[tokio::test]
async fn create_refuses_a_domain_owned_elsewhere() {
    let (_dir, ctx, exec) = staged();
    install_config(&ctx, ServerType::Apache, "blog.example.com");

    let err = domain::create(&ctx, &create_opts("blog.example.com", ServerType::Nginx))
        .await
        .unwrap_err();

    assert!(matches!(err.downcast_ref::<SiteError>(), Some(SiteError::AlreadyExists(_))));
    assert!(exec.lines().is_empty());
    assert!(!ctx.layout.available_path(ServerType::Nginx, "blog.example.com").exists());
}

#[tokio::test]
async fn create_rejects_invalid_input_before_side_effects() {
    let (_dir, ctx, exec) = staged();

    let mut opts = create_opts("blog.example.com", ServerType::Nginx);
    opts.port = "70000".to_string();
    assert!(domain::create(&ctx, &opts).await.is_err());

    let opts = create_opts("-bad-.com", ServerType::Nginx);
    assert!(domain::create(&ctx, &opts).await.is_err());

    assert!(exec.lines().is_empty());
}

#[tokio::test]
async fn ssl_failure_during_create_is_only_a_warning() {
    let (_dir, ctx, exec) = staged();
    exec.respond("certbot", CommandOutput::failed(1, "too many certificates"));

    let mut opts = create_opts("blog.example.com", ServerType::Apache);
    opts.ssl = true;
    domain::create(&ctx, &opts).await.unwrap();

    assert!(exec.lines().iter().any(|l| l.starts_with("certbot --apache -d blog.example.com")));
}

#[tokio::test]
async fn update_port_keeps_exact_backup() {
    let (_dir, ctx, exec) = staged();
    install_config(&ctx, ServerType::Apache, "blog.example.com");
    let path = ctx.layout.available_path(ServerType::Apache, "blog.example.com");
    let before = fs::read(&path).unwrap();

    domain::update_port(&ctx, "blog.example.com", "8080").await.unwrap();

    let mut bak = path.clone().into_os_string();
    bak.push(".bak");
    assert_eq!(fs::read(&bak).unwrap(), before);

    let after = fs::read_to_string(&path).unwrap();
    assert!(after.starts_with("<VirtualHost *:8080>"));
    assert_eq!(exec.lines(), vec!["systemctl reload apache2".to_string()]);
}

#[tokio::test]
async fn update_port_without_binding_leaves_file_alone() {
    let (_dir, ctx, exec) = staged();
    install_config(&ctx, ServerType::Nginx, "blog.example.com");
    let path = ctx.layout.available_path(ServerType::Nginx, "blog.example.com");
    let before = fs::read(&path).unwrap();

    domain::update_port(&ctx, "blog.example.com", "8080").await.unwrap();

    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(exec.lines().is_empty());
}

#[tokio::test]
async fn remove_disables_and_deletes_config() {
    let (_dir, ctx, exec) = staged();
    install_config(&ctx, ServerType::Nginx, "blog.example.com");
    ctx.controller().enable(ServerType::Nginx, "blog.example.com").await.unwrap();

    let opts = RemoveOptions {
        domain: "blog.example.com".to_string(),
        server: None,
        keep_user: true,
        keep_db: false,
        assume_yes: true,
    };
    domain::remove(&ctx, &opts).await.unwrap();

    assert!(!ctx.layout.available_path(ServerType::Nginx, "blog.example.com").exists());
    assert!(!is_link(&ctx.layout.enabled_path(ServerType::Nginx, "blog.example.com")));
    let lines = exec.lines();
    assert!(lines.iter().any(|l| l.starts_with("mysql -e DROP DATABASE IF EXISTS `blog`")));
    assert!(!lines.iter().any(|l| l.starts_with("userdel")));
}

#[tokio::test]
async fn clone_retargets_config_and_enables_target() {
    let (_dir, ctx, exec) = staged();
    install_config(&ctx, ServerType::Nginx, "blog.example.com");

    let opts = CloneOptions {
        source: "blog.example.com".to_string(),
        target: "shop.example.org".to_string(),
        clone_db: false,
        clone_user: true,
    };
    domain::clone(&ctx, &opts).await.unwrap();

    let config = fs::read_to_string(ctx.layout.available_path(ServerType::Nginx, "shop.example.org")).unwrap();
    assert!(config.contains("server_name shop.example.org www.shop.example.org;"));
    assert!(config.contains("root /home/shop/public_html;"));
    assert!(!config.contains("blog"));
    assert!(is_link(&ctx.layout.enabled_path(ServerType::Nginx, "shop.example.org")));

    let lines = exec.lines();
    assert!(lines.contains(&"useradd -m -s /bin/bash shop".to_string()));
    assert!(lines.iter().any(|l| l.starts_with("cp -r") && l.contains("/home/blog/public_html/.")));
}

#[tokio::test]
async fn clone_between_domains_sharing_a_user_only_adds_config() {
    let (_dir, ctx, exec) = staged();
    install_config(&ctx, ServerType::Nginx, "blog.example.com");

    let opts = CloneOptions {
        source: "blog.example.com".to_string(),
        target: "blog.example.org".to_string(),
        clone_db: true,
        clone_user: true,
    };
    domain::clone(&ctx, &opts).await.unwrap();

    let config = fs::read_to_string(ctx.layout.available_path(ServerType::Nginx, "blog.example.org")).unwrap();
    assert!(config.contains("server_name blog.example.org www.blog.example.org;"));
    assert!(config.contains("root /home/blog/public_html;"));
    assert!(is_link(&ctx.layout.enabled_path(ServerType::Nginx, "blog.example.org")));

    let lines = exec.lines();
    assert!(!lines.iter().any(|l| l.starts_with("cp ")));
    assert!(!lines.iter().any(|l| l.starts_with("useradd") || l.starts_with("mysql")));
    assert_eq!(lines, vec!["systemctl reload nginx".to_string()]);
}

#[tokio::test]
async fn clone_refuses_existing_target() {
    let (_dir, ctx, _exec) = staged();
    install_config(&ctx, ServerType::Nginx, "blog.example.com");
    install_config(&ctx, ServerType::Apache, "shop.example.org");

    let opts = CloneOptions {
        source: "blog.example.com".to_string(),
        target: "shop.example.org".to_string(),
        clone_db: false,
        clone_user: false,
    };
    let err = domain::clone(&ctx, &opts).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<SiteError>(), Some(SiteError::AlreadyExists(_))));
}

#[tokio::test]
async fn status_of_an_enabled_site_with_certificate() {
    let (_dir, ctx, exec) = staged();
    install_config(&ctx, ServerType::Nginx, "blog.example.com");
    ctx.controller().enable(ServerType::Nginx, "blog.example.com").await.unwrap();
    fs::create_dir_all(ctx.layout.public_html("blog")).unwrap();
    fs::create_dir_all(ctx.layout.resolve("/etc")).unwrap();
    fs::write(
        ctx.layout.resolve("/etc/passwd"),
        "root:x:0:0:root:/root:/bin/bash\nblog:x:1001:1001::/home/blog:/bin/bash\n",
    )
    .unwrap();
    exec.respond(
        "certbot",
        CommandOutput::ok("Found the following certs:\n  Certificate Name: blog.example.com\n"),
    );

    let status = domain::status(&ctx, "blog.example.com").await.unwrap();

    assert_eq!(status.server, Some(ServerType::Nginx));
    assert_eq!(status.state, SiteState::Enabled);
    assert_eq!(status.user, "blog");
    assert!(status.user_exists);
    assert!(status.public_html_exists);
    assert_eq!(status.certificate, Some(CertificateStatus::Installed));
    assert!(exec
        .lines()
        .contains(&"certbot certificates --cert-name blog.example.com".to_string()));
}

#[tokio::test]
async fn status_reports_missing_certificate_and_caddy_tls() {
    let (_dir, ctx, exec) = staged();
    install_config(&ctx, ServerType::Apache, "wiki.example.com");
    install_config(&ctx, ServerType::Caddy, "shop.example.com");
    exec.respond("certbot", CommandOutput::ok("No certificates found.\n"));

    let wiki = domain::status(&ctx, "wiki.example.com").await.unwrap();
    assert_eq!(wiki.server, Some(ServerType::Apache));
    assert_eq!(wiki.state, SiteState::Disabled);
    assert_eq!(wiki.certificate, Some(CertificateStatus::NotFound));
    assert!(!wiki.user_exists);

    let shop = domain::status(&ctx, "shop.example.com").await.unwrap();
    assert_eq!(shop.certificate, Some(CertificateStatus::Automatic));
    assert_eq!(count(&exec.lines(), "certbot certificates --cert-name shop.example.com"), 0);
}

#[tokio::test]
async fn status_without_config_still_reports_user_and_root() {
    let (_dir, ctx, exec) = staged();

    let status = domain::status(&ctx, "ghost.example.com").await.unwrap();

    assert_eq!(status.server, None);
    assert_eq!(status.state, SiteState::Disabled);
    assert_eq!(status.user, "ghost");
    assert_eq!(status.public_html, ctx.layout.public_html("ghost"));
    assert!(!status.public_html_exists);
    assert_eq!(status.certificate, None);
    assert!(exec.lines().is_empty());
}

#[tokio::test]
async fn inspect_returns_config_text() {
    let (_dir, ctx, _exec) = staged();
    install_config(&ctx, ServerType::Caddy, "blog.example.com");

    let (path, content) = domain::inspect(&ctx, "blog.example.com", None).unwrap();
    assert_eq!(path, ctx.layout.available_path(ServerType::Caddy, "blog.example.com"));
    assert!(content.starts_with("blog.example.com:80 {"));
}

#[tokio::test]
async fn backup_archives_relative_members() {
    let (_dir, ctx, exec) = staged();

    let archive = backup::backup_domain(&ctx, "blog.example.com", ArchiveFormat::TarGz)
        .await
        .unwrap();

    let name = archive.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("blog.example.com-"));
    assert!(name.ends_with(".tar.gz"));
    assert!(archive.starts_with(ctx.settings.backup_dir()));

    let commands = exec.commands();
    let tar = commands.iter().find(|c| c.program == "tar").unwrap();
    assert_eq!(tar.cwd.as_deref(), Some(ctx.layout.root()));
    assert!(tar.args.contains(&"home/blog/public_html".to_string()));
    assert!(tar.args.contains(&"var/backups/blog.example.com-db.sql".to_string()));
}

#[tokio::test]
async fn backup_without_database_archives_files_only() {
    let (_dir, ctx, exec) = staged();
    exec.respond("mysqldump", CommandOutput::failed(2, "Unknown database 'blog'"));

    backup::backup_domain(&ctx, "blog.example.com", ArchiveFormat::Zip)
        .await
        .unwrap();

    let commands = exec.commands();
    let zip = commands.iter().find(|c| c.program == "zip").unwrap();
    assert!(!zip.args.iter().any(|a| a.ends_with(".sql")));
}

#[tokio::test]
async fn restore_copies_files_and_cleans_staging() {
    let (dir, ctx, exec) = staged();
    let archive = dir.path().join("blog.example.com-20250101_000000.tar.gz");
    fs::write(&archive, b"").unwrap();

    backup::restore_domain(&ctx, "blog.example.com", &archive).await.unwrap();

    let staging = ctx.layout.resolve("/tmp/restore-blog");
    let lines = exec.lines();
    assert_eq!(
        lines[0],
        format!("tar -xzf {} -C {}", archive.display(), staging.display())
    );
    assert!(lines.iter().any(|l| l.starts_with("cp -r")));
    assert!(lines.iter().any(|l| l.starts_with("chown -R blog:blog")));
    assert_eq!(lines.last().unwrap(), &format!("rm -rf {}", staging.display()));
}

#[tokio::test]
async fn restore_rejects_unknown_archive_type() {
    let (dir, ctx, exec) = staged();
    let archive = dir.path().join("blog.rar");
    fs::write(&archive, b"").unwrap();

    assert!(backup::restore_domain(&ctx, "blog.example.com", &archive).await.is_err());
    assert!(exec.lines().is_empty());
}
