//! Site lifecycle workflows built on the registry, the generator and the
//! state controller: create, remove, clone, update-port, status, inspect.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context as _, Result};
use dialoguer::Confirm;
use log::{info, warn};

use crate::{
    backup,
    context::Context,
    database,
    detect::{detect, owners},
    error::SiteError,
    lock::DomainLock,
    logger,
    server::ServerType,
    shell::ShellCommand,
    site::SiteState,
    ssl::{self, CertificateStatus},
    users,
    vhost::{self, username_for, validate_domain, validate_port, VirtualHostSpec},
};

/// Writes a new site config. Never replaces an existing file.
pub fn write_config(path: &Path, content: &str) -> Result<(), SiteError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SiteError::io(parent, e))?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(SiteError::AlreadyExists(path.to_path_buf()))
        }
        Err(e) => return Err(SiteError::io(path, e)),
    };

    file.write_all(content.as_bytes())
        .map_err(|e| SiteError::io(path, e))?;
    Ok(())
}

fn refuse_if_owned(ctx: &Context, domain: &str) -> Result<(), SiteError> {
    match owners(&ctx.layout, domain).first() {
        Some(&server) => Err(SiteError::AlreadyExists(ctx.layout.available_path(server, domain))),
        None => Ok(()),
    }
}

/// The given server, or the detected one.
pub fn resolve_server(ctx: &Context, domain: &str, server: Option<ServerType>) -> Result<ServerType, SiteError> {
    match server {
        Some(server) => Ok(server),
        None => detect(&ctx.layout, domain),
    }
}

#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub domain: String,
    pub server: ServerType,
    pub port: String,
    pub with_db: bool,
    pub ssl: bool,
}

/// Provisions a new site: shell user, document root, config, link and
/// optionally a database and a certificate.
pub async fn create(ctx: &Context, opts: &CreateOptions) -> Result<()> {
    let spec = VirtualHostSpec::new(&opts.domain, &opts.port)?;
    let _lock = DomainLock::acquire(&ctx.layout.lock_dir(), &spec.domain)?;
    refuse_if_owned(ctx, &spec.domain)?;

    info!("Creating {} site {} on port {}", opts.server, spec.domain, spec.port);

    users::create_shell_user(&ctx.layout, ctx.exec(), &spec.username).await?;

    let public_html = ctx.layout.public_html(&spec.username);
    users::create_placeholder_page(&public_html, &spec.domain)?;
    users::chown_recursive(ctx.exec(), &spec.username, &public_html).await?;

    let config_path = ctx.layout.available_path(opts.server, &spec.domain);
    write_config(&config_path, &vhost::generate(opts.server, &spec))?;
    info!("Config written: {:?}", config_path);

    ctx.controller().enable_locked(opts.server, &spec.domain).await?;

    if opts.with_db {
        let password = database::generate_password(16)?;
        database::create_user_and_database(ctx.exec(), &spec.username, &password).await?;
        logger::secret(&format!("MySQL password for '{}': {}", spec.username, password));
    }

    if opts.ssl {
        if let Err(e) = ssl::issue(ctx, opts.server, &spec.domain, false).await {
            warn!("SSL setup failed, the site is served without TLS: {:#}", e);
        }
    }

    logger::success(&format!("Domain '{}' created", spec.domain));
    Ok(())
}

#[derive(Debug, Clone)]
pub struct RemoveOptions {
    pub domain: String,
    pub server: Option<ServerType>,
    pub keep_user: bool,
    pub keep_db: bool,
    pub assume_yes: bool,
}

/// Tears a site down. Steps after disabling are best effort.
pub async fn remove(ctx: &Context, opts: &RemoveOptions) -> Result<()> {
    validate_domain(&opts.domain)?;
    let server = resolve_server(ctx, &opts.domain, opts.server)?;
    let user = username_for(&opts.domain);

    if !opts.keep_user && users::is_invoking_user(user) {
        bail!("Refusing to delete the current user '{}', use --keep-user", user);
    }

    if !opts.assume_yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove {} site {} and its data?", server, opts.domain))
            .default(false)
            .interact()?;
        if !confirmed {
            info!("Aborted");
            return Ok(());
        }
    }

    let _lock = DomainLock::acquire(&ctx.layout.lock_dir(), &opts.domain)?;
    info!("Removing domain: {}", opts.domain);

    ctx.controller().disable_locked(server, &opts.domain).await?;

    let config_path = ctx.layout.available_path(server, &opts.domain);
    match fs::remove_file(&config_path) {
        Ok(()) => info!("Removed config file: {:?}", config_path),
        Err(e) => warn!("Could not delete config file {:?}: {}", config_path, e),
    }

    if opts.keep_db {
        info!("Keeping MySQL database (per flag)");
    } else {
        match database::drop_user_and_database(ctx.exec(), user).await {
            Ok(()) => info!("MySQL user and database removed"),
            Err(e) => warn!("MySQL cleanup failed: {:#}", e),
        }
    }

    if opts.keep_user {
        info!("Keeping shell user and home directory (per flag)");
    } else {
        users::delete_user(&ctx.layout, ctx.exec(), user, true).await?;
    }

    logger::success(&format!("Domain '{}' removed", opts.domain));
    Ok(())
}

/// Rewrites a source config for the target domain: the document root of the
/// source user first, then every occurrence of the domain itself.
pub fn retarget_config(content: &str, source: &str, target: &str) -> String {
    let source_home = format!("/home/{}/", username_for(source));
    let target_home = format!("/home/{}/", username_for(target));
    content
        .replace(&source_home, &target_home)
        .replace(source, target)
}

#[derive(Debug, Clone)]
pub struct CloneOptions {
    pub source: String,
    pub target: String,
    pub clone_db: bool,
    pub clone_user: bool,
}

pub async fn clone(ctx: &Context, opts: &CloneOptions) -> Result<()> {
    validate_domain(&opts.source)?;
    validate_domain(&opts.target)?;
    if opts.source == opts.target {
        bail!("Source and target domains are the same");
    }

    let server = detect(&ctx.layout, &opts.source)?;
    let _lock = DomainLock::acquire(&ctx.layout.lock_dir(), &opts.target)?;
    refuse_if_owned(ctx, &opts.target)?;

    info!("Cloning {} site {} to {}", server, opts.source, opts.target);
    let src_user = username_for(&opts.source);
    let dst_user = username_for(&opts.target);

    let src_conf = ctx.layout.available_path(server, &opts.source);
    let content = fs::read_to_string(&src_conf)
        .with_context(|| format!("Failed to read {:?}", src_conf))?;
    let dst_conf = ctx.layout.available_path(server, &opts.target);
    write_config(&dst_conf, &retarget_config(&content, &opts.source, &opts.target))?;
    info!("Config copied to {:?}", dst_conf);

    if src_user == dst_user {
        info!(
            "{} and {} share the user '{}', keeping its files and database as they are",
            opts.source, opts.target, src_user
        );
    } else {
        copy_site_data(ctx, opts, src_user, dst_user).await?;
    }

    ctx.controller().enable_locked(server, &opts.target).await?;

    logger::success(&format!("Domain {} cloned to {}", opts.source, opts.target));
    Ok(())
}

/// Copies the document root and optionally the user and the database.
async fn copy_site_data(ctx: &Context, opts: &CloneOptions, src_user: &str, dst_user: &str) -> Result<()> {
    if opts.clone_user {
        users::create_shell_user(&ctx.layout, ctx.exec(), dst_user).await?;
    }

    info!("Copying website files...");
    let src_html = ctx.layout.public_html(src_user);
    let dst_html = ctx.layout.public_html(dst_user);
    ctx.exec()
        .run_checked(&ShellCommand::root("mkdir", ["-p".to_string(), dst_html.to_string_lossy().to_string()]))
        .await?;
    ctx.exec()
        .run_checked(&ShellCommand::root(
            "cp",
            [
                "-r".to_string(),
                format!("{}/.", src_html.to_string_lossy()),
                dst_html.to_string_lossy().to_string(),
            ],
        ))
        .await
        .context("Failed to copy website files")?;

    if opts.clone_user {
        users::chown_recursive(ctx.exec(), dst_user, &ctx.layout.home_dir(dst_user)).await?;
    }

    if opts.clone_db {
        clone_database(ctx, src_user, dst_user).await?;
    }
    Ok(())
}

async fn clone_database(ctx: &Context, src_user: &str, dst_user: &str) -> Result<()> {
    info!("Cloning MySQL database {} -> {}", src_user, dst_user);

    let dump = ctx.layout.resolve(&format!("/tmp/{}.sql", src_user));
    database::dump(ctx.exec(), src_user, &dump).await?;

    let password = database::generate_password(16)?;
    let result: Result<()> = async {
        database::create_user_and_database(ctx.exec(), dst_user, &password).await?;
        database::import(ctx.exec(), dst_user, &dump).await
    }
    .await;

    if dump.exists() {
        if let Err(e) = fs::remove_file(&dump) {
            warn!("Failed to remove temporary dump {:?}: {}", dump, e);
        }
    }

    result?;
    logger::secret(&format!("MySQL password for '{}': {}", dst_user, password));
    Ok(())
}

/// Replaces every `:80` not followed by another digit with `:<port>`.
///
/// Returns `None` when the content has no such occurrence.
///
/// # Examples
/// ```rust
/// use stackroost::domain::rewrite_port;
///
/// assert_eq!(rewrite_port("<VirtualHost *:80>", "8080").as_deref(), Some("<VirtualHost *:8080>"));
/// assert_eq!(rewrite_port("listen 127.0.0.1:8080;", "81"), None);
/// ```
pub fn rewrite_port(content: &str, port: &str) -> Option<String> {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    let mut replaced = false;

    while let Some(pos) = rest.find(":80") {
        let after = &rest[pos + 3..];
        out.push_str(&rest[..pos]);
        if after.starts_with(|c: char| c.is_ascii_digit()) {
            out.push_str(":80");
        } else {
            out.push(':');
            out.push_str(port);
            replaced = true;
        }
        rest = after;
    }
    out.push_str(rest);

    if replaced {
        Some(out)
    } else {
        None
    }
}

/// Moves a site from port 80 to `port`. The previous config is kept as a
/// `.bak` sibling.
pub async fn update_port(ctx: &Context, domain: &str, port: &str) -> Result<()> {
    validate_domain(domain)?;
    validate_port(port)?;
    let server = detect(&ctx.layout, domain)?;
    let _lock = DomainLock::acquire(&ctx.layout.lock_dir(), domain)?;

    let path = ctx.layout.available_path(server, domain);
    let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;

    backup::backup_file(&path)?;

    let updated = match rewrite_port(&content, port) {
        Some(updated) => updated,
        None => {
            warn!("No ':80' found in {:?}, config left unchanged", path);
            return Ok(());
        }
    };

    fs::write(&path, updated).with_context(|| format!("Failed to write {:?}", path))?;
    info!("Port updated to {} in {:?}", port, path);

    ctx.controller().reload(server).await;
    logger::success(&format!("Port for {} updated to {}", domain, port));
    Ok(())
}

/// Snapshot of everything known about one domain.
#[derive(Debug, Clone)]
pub struct DomainStatus {
    pub domain: String,
    pub server: Option<ServerType>,
    pub state: SiteState,
    pub user: String,
    pub user_exists: bool,
    pub public_html: PathBuf,
    pub public_html_exists: bool,
    pub certificate: Option<CertificateStatus>,
}

pub async fn status(ctx: &Context, domain: &str) -> Result<DomainStatus> {
    validate_domain(domain)?;
    let server = match detect(&ctx.layout, domain) {
        Ok(server) => Some(server),
        Err(e) => {
            warn!("{}", e);
            None
        }
    };

    let user = username_for(domain).to_string();
    let public_html = ctx.layout.public_html(&user);

    let (state, certificate) = match server {
        Some(server) => (
            ctx.controller().state(server, domain),
            Some(ssl::certificate_status(ctx.exec(), server, domain).await),
        ),
        None => (SiteState::Disabled, None),
    };

    Ok(DomainStatus {
        domain: domain.to_string(),
        server,
        state,
        user_exists: users::find(&ctx.layout, &user).is_some(),
        user,
        public_html_exists: public_html.is_dir(),
        public_html,
        certificate,
    })
}

/// Config text of a domain, with the path it was read from.
pub fn inspect(ctx: &Context, domain: &str, server: Option<ServerType>) -> Result<(PathBuf, String)> {
    validate_domain(domain)?;
    let server = resolve_server(ctx, domain, server)?;
    let path = ctx.layout.available_path(server, domain);
    let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
    Ok((path, content))
}
