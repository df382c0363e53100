use std::{
    io::Read,
    net::{TcpStream, ToSocketAddrs},
    path::PathBuf,
    time::Duration,
};

use anyhow::{anyhow, bail, Context as _, Result};
use log::{debug, info, warn};
use ssh2::{CheckResult, KnownHostFileKind, Session};

use crate::{config::RemoteHost, context::Context, logger};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Splits `user@host`.
pub fn parse_user_host(user_host: &str) -> Result<(&str, &str)> {
    match user_host.split_once('@') {
        Some((user, host)) if !user.is_empty() && !host.is_empty() && !host.contains('@') => {
            Ok((user, host))
        }
        _ => bail!("Invalid remote '{}', expected user@host", user_host),
    }
}

/// Registers a remote host in the settings file.
pub fn add(ctx: &mut Context, name: &str, user_host: &str, key: PathBuf, port: u16) -> Result<()> {
    parse_user_host(user_host)?;
    if !key.is_file() {
        warn!("Key file {:?} does not exist yet", key);
    }

    let remote = RemoteHost {
        user_host: user_host.to_string(),
        key,
        port,
    };
    if ctx.settings.remotes.insert(name.to_string(), remote).is_some() {
        info!("Replacing existing remote '{}'", name);
    }
    ctx.save_settings()?;

    logger::success(&format!("Added remote {}: {}", name, user_host));
    Ok(())
}

/// Output of a command run on a remote host.
#[derive(Debug, Clone)]
pub struct RemoteOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

fn verify_host_key(session: &Session, host: &str, port: u16) -> Result<()> {
    let mut known_hosts = session.known_hosts()?;
    if let Some(path) = dirs::home_dir().map(|home| home.join(".ssh").join("known_hosts")) {
        if path.is_file() {
            known_hosts.read_file(&path, KnownHostFileKind::OpenSSH)?;
        }
    }

    let (key, _) = session
        .host_key()
        .ok_or_else(|| anyhow!("{} did not present a host key", host))?;

    match known_hosts.check_port(host, port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => {
            warn!("Host key of {} is not in known_hosts", host);
            Ok(())
        }
        CheckResult::Mismatch => bail!("Host key of {} does not match known_hosts", host),
        CheckResult::Failure => {
            warn!("Could not check the host key of {}", host);
            Ok(())
        }
    }
}

fn run_blocking(remote: &RemoteHost, command: &str) -> Result<RemoteOutput> {
    let (user, host) = parse_user_host(&remote.user_host)?;

    let address = (host, remote.port)
        .to_socket_addrs()
        .with_context(|| format!("Failed to resolve {}", host))?
        .next()
        .ok_or_else(|| anyhow!("No address found for {}", host))?;

    debug!("Connecting to {} ({})", remote.user_host, address);
    let tcp = TcpStream::connect_timeout(&address, CONNECT_TIMEOUT)
        .with_context(|| format!("Failed to connect to {}:{}", host, remote.port))?;

    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    session.handshake().context("SSH handshake failed")?;
    verify_host_key(&session, host, remote.port)?;

    session
        .userauth_pubkey_file(user, None, &remote.key, None)
        .with_context(|| format!("Public key authentication as {} failed", user))?;
    if !session.authenticated() {
        bail!("Authentication as {} failed", user);
    }

    let mut channel = session.channel_session()?;
    channel.exec(command)?;

    let mut stdout = String::new();
    channel.read_to_string(&mut stdout)?;
    let mut stderr = String::new();
    channel.stderr().read_to_string(&mut stderr)?;

    channel.wait_close()?;
    Ok(RemoteOutput {
        stdout,
        stderr,
        exit_status: channel.exit_status()?,
    })
}

/// Runs a command on a registered remote host.
pub async fn exec(ctx: &Context, name: &str, command: &str) -> Result<RemoteOutput> {
    let remote = ctx
        .settings
        .remotes
        .get(name)
        .cloned()
        .ok_or_else(|| anyhow!("Unknown remote '{}', add it with `remote add`", name))?;

    info!("Running on {}: {}", remote.user_host, command);
    let command = command.to_string();
    tokio::task::spawn_blocking(move || run_blocking(&remote, &command)).await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_user_and_host() {
        assert_eq!(parse_user_host("deploy@10.0.0.5").unwrap(), ("deploy", "10.0.0.5"));
        assert!(parse_user_host("10.0.0.5").is_err());
        assert!(parse_user_host("@host").is_err());
        assert!(parse_user_host("user@").is_err());
        assert!(parse_user_host("a@b@c").is_err());
    }

    #[test]
    fn add_persists_remote() {
        use std::sync::Arc;

        use crate::{config::Settings, shell::RecordingExecutor};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let mut ctx = Context::new(Settings::default(), path.clone(), Arc::new(RecordingExecutor::new()));

        add(&mut ctx, "web1", "deploy@web1.internal", dir.path().join("id_ed25519"), 2222).unwrap();

        let saved = Settings::load(&path).unwrap();
        assert_eq!(saved.remotes["web1"].user_host, "deploy@web1.internal");
        assert_eq!(saved.remotes["web1"].port, 2222);
        assert!(add(&mut ctx, "bad", "nohost", dir.path().join("k"), 22).is_err());
    }
}
