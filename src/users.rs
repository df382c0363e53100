use std::{env, fs, path::Path};

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use nix::unistd::{geteuid, User};

use crate::{
    logger,
    server::Layout,
    shell::{Executor, ShellCommand},
};

/// One line of `/etc/passwd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry {
    pub name: String,
    pub uid: u32,
    pub home: String,
    pub shell: String,
}

impl PasswdEntry {
    /// Regular login account: uid 1000 or above with a POSIX shell.
    pub fn is_shell_user(&self) -> bool {
        self.uid >= 1000 && (self.shell == "/bin/bash" || self.shell == "/bin/sh")
    }
}

/// Parses passwd content, skipping malformed lines.
pub fn parse_passwd(content: &str) -> Vec<PasswdEntry> {
    content
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(':').collect();
            if parts.len() < 7 {
                return None;
            }
            let uid = parts[2].parse().ok()?;
            Some(PasswdEntry {
                name: parts[0].to_string(),
                uid,
                home: parts[5].to_string(),
                shell: parts[6].to_string(),
            })
        })
        .collect()
}

fn read_passwd(layout: &Layout) -> Result<Vec<PasswdEntry>> {
    let path = layout.resolve("/etc/passwd");
    let content =
        fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
    Ok(parse_passwd(&content))
}

/// Regular shell users of the host.
pub fn list_shell_users(layout: &Layout) -> Result<Vec<PasswdEntry>> {
    Ok(read_passwd(layout)?
        .into_iter()
        .filter(PasswdEntry::is_shell_user)
        .collect())
}

pub fn find(layout: &Layout, name: &str) -> Option<PasswdEntry> {
    match read_passwd(layout) {
        Ok(entries) => entries.into_iter().find(|e| e.name == name),
        Err(e) => {
            debug!("{:#}", e);
            None
        }
    }
}

/// Whether `name` is the account running this process, directly or via sudo.
pub fn is_invoking_user(name: &str) -> bool {
    if let Ok(Some(user)) = User::from_uid(geteuid()) {
        if user.name == name {
            return true;
        }
    }
    env::var("SUDO_USER").map_or(false, |u| u == name)
}

/// Creates a login user with a home directory unless it exists already.
///
/// Returns `true` when a new account was created.
pub async fn create_shell_user(layout: &Layout, exec: &dyn Executor, name: &str) -> Result<bool> {
    if find(layout, name).is_some() {
        info!("User {} already exists", name);
        return Ok(false);
    }

    info!("Creating user {}...", name);
    exec.run_checked(&ShellCommand::root("useradd", ["-m", "-s", "/bin/bash", name]))
        .await
        .with_context(|| format!("Failed to create user {}", name))?;

    logger::success(&format!("User '{}' created", name));
    Ok(true)
}

/// Deletes a user. A missing user is only a warning; deleting the account
/// that runs the tool is refused.
pub async fn delete_user(layout: &Layout, exec: &dyn Executor, name: &str, remove_home: bool) -> Result<()> {
    if is_invoking_user(name) {
        bail!("Refusing to delete the current user '{}'", name);
    }

    if find(layout, name).is_none() {
        warn!("User '{}' does not exist", name);
        return Ok(());
    }

    info!("Deleting user: {}", name);
    let mut cmd = ShellCommand::new("userdel").privileged();
    if remove_home {
        cmd = cmd.arg("-r");
    }
    exec.run_checked(&cmd.arg(name))
        .await
        .with_context(|| format!("Failed to delete user {}", name))?;

    logger::success(&format!("User '{}' deleted", name));
    Ok(())
}

/// Writes a placeholder `index.html` for a freshly created site.
pub fn create_placeholder_page(public_html: &Path, domain: &str) -> Result<()> {
    let html_content = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{domain}</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 0; padding: 20px; color: #333; }}
        h1 {{ color: #2c3e50; }}
        .container {{ max-width: 800px; margin: 0 auto; padding: 20px; border: 1px solid #ddd; border-radius: 5px; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>{domain} is up</h1>
        <p>This page was created by stackroost. Replace it with your site.</p>
    </div>
</body>
</html>
"#,
        domain = domain
    );

    fs::create_dir_all(public_html)
        .with_context(|| format!("Failed to create directory: {:?}", public_html))?;

    let index = public_html.join("index.html");
    if index.exists() {
        debug!("{:?} already exists, keeping it", index);
        return Ok(());
    }

    fs::write(&index, html_content)
        .with_context(|| format!("Failed to write placeholder page: {:?}", index))?;

    info!("Placeholder page created: {:?}", index);
    Ok(())
}

/// `chown -R user:user path`.
pub async fn chown_recursive(exec: &dyn Executor, user: &str, path: &Path) -> Result<()> {
    exec.run_checked(&ShellCommand::root(
        "chown",
        [
            "-R".to_string(),
            format!("{}:{}", user, user),
            path.to_string_lossy().to_string(),
        ],
    ))
    .await
    .with_context(|| format!("Failed to change owner of {:?}", path))?;
    Ok(())
}
