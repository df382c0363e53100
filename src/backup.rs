use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context as _, Result};
use chrono::Local;
use clap::ValueEnum;
use log::{debug, info, warn};

use crate::{
    context::Context,
    database, logger,
    shell::ShellCommand,
    vhost::{username_for, validate_domain},
};

/// Copies a file to `<path>.bak` before it gets modified.
///
/// The copy keeps the exact bytes of the original. Returns the path of the
/// backup.
///
/// # Examples
/// ```rust,no_run
/// let bak = stackroost::backup::backup_file("/etc/ssh/sshd_config")?;
/// assert!(bak.to_string_lossy().ends_with(".bak"));
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn backup_file<P: AsRef<Path>>(file_path: P) -> Result<PathBuf> {
    let path = file_path.as_ref();

    let mut backup_path = path.as_os_str().to_owned();
    backup_path.push(".bak");
    let backup_path = PathBuf::from(backup_path);

    fs::copy(path, &backup_path)
        .with_context(|| format!("Failed to back up {:?} to {:?}", path, backup_path))?;

    info!("Backup created {:?} -> {:?}", path, backup_path);
    Ok(backup_path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArchiveFormat {
    #[value(name = "tar.gz")]
    TarGz,
    Tar,
    Zip,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::Zip => "zip",
        }
    }

    /// Picks the format from an archive file name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path.to_string_lossy();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(ArchiveFormat::TarGz)
        } else if name.ends_with(".tar") {
            Ok(ArchiveFormat::Tar)
        } else if name.ends_with(".zip") {
            Ok(ArchiveFormat::Zip)
        } else {
            bail!("Unsupported archive type: {:?} (use tar.gz, tar or zip)", path)
        }
    }

    fn create_command(self, archive: &Path, members: &[String]) -> ShellCommand {
        let archive = archive.to_string_lossy().to_string();
        let cmd = match self {
            ArchiveFormat::TarGz => ShellCommand::root("tar", ["-czf".to_string(), archive]),
            ArchiveFormat::Tar => ShellCommand::root("tar", ["-cf".to_string(), archive]),
            ArchiveFormat::Zip => ShellCommand::root("zip", ["-r".to_string(), archive]),
        };
        cmd.args(members.iter().cloned())
    }

    fn extract_command(self, archive: &Path, into: &Path) -> ShellCommand {
        let archive = archive.to_string_lossy().to_string();
        let into = into.to_string_lossy().to_string();
        match self {
            ArchiveFormat::TarGz => ShellCommand::root("tar", ["-xzf".to_string(), archive, "-C".to_string(), into]),
            ArchiveFormat::Tar => ShellCommand::root("tar", ["-xf".to_string(), archive, "-C".to_string(), into]),
            ArchiveFormat::Zip => ShellCommand::root("unzip", ["-o".to_string(), archive, "-d".to_string(), into]),
        }
    }
}

/// Path of `path` relative to the root prefix, as archive members are stored.
fn relative_to_root(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .trim_start_matches('/')
        .to_string()
}

/// Archives the site files and database of a domain.
///
/// The archive lands in the backup directory as
/// `<domain>-<YYYYmmdd_HHMMSS>.<ext>`. A failed database dump only produces a
/// warning and the archive is created without it.
pub async fn backup_domain(ctx: &Context, domain: &str, format: ArchiveFormat) -> Result<PathBuf> {
    validate_domain(domain)?;
    let user = username_for(domain);
    let root = ctx.layout.root().to_path_buf();

    let backup_dir = ctx.settings.backup_dir();
    fs::create_dir_all(&backup_dir)
        .with_context(|| format!("Failed to create backup directory: {:?}", backup_dir))?;

    let public_html = ctx.layout.public_html(user);
    let mut members = vec![relative_to_root(&root, &public_html)];

    let dump = backup_dir.join(format!("{}-db.sql", domain));
    match database::dump(ctx.exec(), user, &dump).await {
        Ok(()) => members.push(relative_to_root(&root, &dump)),
        Err(e) => warn!("Could not dump MySQL database '{}', archiving files only: {:#}", user, e),
    }

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let archive = backup_dir.join(format!("{}-{}.{}", domain, timestamp, format.extension()));

    info!("Creating {} archive", format.extension());
    let result = ctx
        .exec()
        .run_checked(&format.create_command(&archive, &members).current_dir(&root))
        .await;

    if dump.exists() {
        if let Err(e) = fs::remove_file(&dump) {
            warn!("Failed to remove database dump {:?}: {}", dump, e);
        }
    }

    result.with_context(|| format!("Failed to create backup archive {:?}", archive))?;

    logger::success(&format!("Backup created: {:?}", archive));
    Ok(archive)
}

/// First `.sql` file below `dir`, searched depth first in name order.
pub fn find_sql_dump(dir: &Path) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            if let Some(found) = find_sql_dump(&path) {
                return Some(found);
            }
        } else if path.extension().map_or(false, |ext| ext == "sql") {
            return Some(path);
        }
    }

    None
}

/// Restores site files and, when the archive carries a dump, the database.
pub async fn restore_domain(ctx: &Context, domain: &str, archive: &Path) -> Result<()> {
    validate_domain(domain)?;
    let format = ArchiveFormat::from_path(archive)?;
    let user = username_for(domain);

    if !archive.is_file() {
        bail!("Backup archive not found: {:?}", archive);
    }

    let staging = ctx.layout.resolve(&format!("/tmp/restore-{}", user));
    fs::create_dir_all(&staging)
        .with_context(|| format!("Failed to create staging directory: {:?}", staging))?;

    let result = restore_from_staging(ctx, user, format, archive, &staging).await;

    debug!("Removing staging directory {:?}", staging);
    let cleanup = ShellCommand::root("rm", ["-rf".to_string(), staging.to_string_lossy().to_string()]);
    if let Err(e) = ctx.exec().run_checked(&cleanup).await {
        warn!("Failed to remove staging directory {:?}: {}", staging, e);
    }

    result?;
    logger::success(&format!("Domain '{}' restored successfully", domain));
    Ok(())
}

async fn restore_from_staging(
    ctx: &Context,
    user: &str,
    format: ArchiveFormat,
    archive: &Path,
    staging: &Path,
) -> Result<()> {
    info!("Extracting {} archive {:?}", format.extension(), archive);
    ctx.exec()
        .run_checked(&format.extract_command(archive, staging))
        .await
        .context("Failed to extract backup archive")?;

    let extracted = staging.join("home").join(user).join("public_html");
    let home = ctx.layout.home_dir(user);
    let public_html = ctx.layout.public_html(user);

    info!("Restoring files to {:?}", public_html);
    ctx.exec()
        .run_checked(&ShellCommand::root(
            "cp",
            [
                "-r".to_string(),
                extracted.to_string_lossy().to_string(),
                home.to_string_lossy().to_string(),
            ],
        ))
        .await
        .context("Failed to copy site files")?;

    ctx.exec()
        .run_checked(&ShellCommand::root(
            "chown",
            [
                "-R".to_string(),
                format!("{}:{}", user, user),
                public_html.to_string_lossy().to_string(),
            ],
        ))
        .await
        .context("Failed to change owner of restored files")?;

    match find_sql_dump(staging) {
        Some(sql) => {
            database::import(ctx.exec(), user, &sql).await?;
            logger::success("MySQL database restored");
        }
        None => warn!("No SQL file found in backup, skipping database restore"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bak_keeps_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.conf");
        let original = b"listen 80;\r\n\xffraw";
        fs::write(&path, original).unwrap();

        let bak = backup_file(&path).unwrap();
        assert_eq!(bak, dir.path().join("site.conf.bak"));
        assert_eq!(fs::read(bak).unwrap(), original);
    }

    #[test]
    fn backup_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(backup_file(dir.path().join("nope.conf")).is_err());
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ArchiveFormat::from_path(Path::new("/b/a.io-1.tar.gz")).unwrap(), ArchiveFormat::TarGz);
        assert_eq!(ArchiveFormat::from_path(Path::new("a.tar")).unwrap(), ArchiveFormat::Tar);
        assert_eq!(ArchiveFormat::from_path(Path::new("a.zip")).unwrap(), ArchiveFormat::Zip);
        assert!(ArchiveFormat::from_path(Path::new("a.rar")).is_err());
    }

    #[test]
    fn finds_nested_dump() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("var").join("backups");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("a.io-db.sql"), "-- dump").unwrap();
        fs::write(dir.path().join("readme.txt"), "x").unwrap();

        assert_eq!(find_sql_dump(dir.path()), Some(nested.join("a.io-db.sql")));
        assert_eq!(find_sql_dump(&dir.path().join("missing")), None);
    }

    #[test]
    fn members_are_relative_to_root() {
        assert_eq!(
            relative_to_root(Path::new("/srv/stage"), Path::new("/srv/stage/home/blog/public_html")),
            "home/blog/public_html"
        );
        assert_eq!(relative_to_root(Path::new("/"), Path::new("/var/backups/a.sql")), "var/backups/a.sql");
    }
}
