use std::{fmt, fs, io};

use log::{info, warn};

use crate::{
    error::SiteError,
    lock::DomainLock,
    server::{Layout, ServerType},
    shell::{Executor, ShellCommand},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteState {
    Enabled,
    Disabled,
}

impl SiteState {
    pub fn is_enabled(self) -> bool {
        self == SiteState::Enabled
    }
}

impl fmt::Display for SiteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteState::Enabled => f.write_str("ENABLED"),
            SiteState::Disabled => f.write_str("DISABLED"),
        }
    }
}

/// Result of a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The site moved to the given state and the service was asked to reload.
    Changed(SiteState),
    /// The site already was in the given state; nothing was touched.
    Unchanged(SiteState),
}

impl Transition {
    pub fn state(self) -> SiteState {
        match self {
            Transition::Changed(s) | Transition::Unchanged(s) => s,
        }
    }
}

/// Link state of a site, read from the enabled directory. Any entry counts,
/// including a dangling symlink.
pub fn state(layout: &Layout, server: ServerType, domain: &str) -> SiteState {
    match fs::symlink_metadata(layout.enabled_path(server, domain)) {
        Ok(_) => SiteState::Enabled,
        Err(_) => SiteState::Disabled,
    }
}

/// Enables, disables and toggles sites and reloads the owning service.
pub struct SiteController<'a> {
    layout: &'a Layout,
    executor: &'a dyn Executor,
}

impl<'a> SiteController<'a> {
    pub fn new(layout: &'a Layout, executor: &'a dyn Executor) -> Self {
        Self { layout, executor }
    }

    pub fn state(&self, server: ServerType, domain: &str) -> SiteState {
        state(self.layout, server, domain)
    }

    pub async fn enable(&self, server: ServerType, domain: &str) -> Result<Transition, SiteError> {
        let _lock = DomainLock::acquire(&self.layout.lock_dir(), domain)?;
        self.enable_locked(server, domain).await
    }

    pub async fn disable(&self, server: ServerType, domain: &str) -> Result<Transition, SiteError> {
        let _lock = DomainLock::acquire(&self.layout.lock_dir(), domain)?;
        self.disable_locked(server, domain).await
    }

    pub async fn toggle(&self, server: ServerType, domain: &str) -> Result<Transition, SiteError> {
        let _lock = DomainLock::acquire(&self.layout.lock_dir(), domain)?;
        match self.state(server, domain) {
            SiteState::Enabled => self.disable_locked(server, domain).await,
            SiteState::Disabled => self.enable_locked(server, domain).await,
        }
    }

    /// Enable for callers that already hold the domain lock.
    pub async fn enable_locked(&self, server: ServerType, domain: &str) -> Result<Transition, SiteError> {
        let available = self.layout.available_path(server, domain);
        if !available.is_file() {
            return Err(SiteError::ConfigMissing(available));
        }

        if self.state(server, domain).is_enabled() {
            info!("{} site {} is already enabled", server, domain);
            return Ok(Transition::Unchanged(SiteState::Enabled));
        }

        info!("Enabling {} site: {}", server, domain);
        let filename = self.layout.config_filename(domain);
        match server.profile().enable_command(&filename) {
            Some(cmd) => {
                self.executor.run_checked(&cmd).await?;
            }
            None => {
                let enabled_dir = self.layout.enabled_dir(server);
                fs::create_dir_all(&enabled_dir).map_err(|e| SiteError::io(&enabled_dir, e))?;
                let link = self.layout.enabled_path(server, domain);
                std::os::unix::fs::symlink(&available, &link).map_err(|e| SiteError::io(&link, e))?;
            }
        }

        self.reload(server).await;
        Ok(Transition::Changed(SiteState::Enabled))
    }

    /// Disable for callers that already hold the domain lock.
    pub async fn disable_locked(&self, server: ServerType, domain: &str) -> Result<Transition, SiteError> {
        if !self.state(server, domain).is_enabled() {
            info!("{} site {} is already disabled", server, domain);
            return Ok(Transition::Unchanged(SiteState::Disabled));
        }

        info!("Disabling {} site: {}", server, domain);
        let filename = self.layout.config_filename(domain);
        match server.profile().disable_command(&filename) {
            Some(cmd) => {
                self.executor.run_checked(&cmd).await?;
            }
            None => {
                let link = self.layout.enabled_path(server, domain);
                match fs::remove_file(&link) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(SiteError::io(&link, e)),
                }
            }
        }

        self.reload(server).await;
        Ok(Transition::Changed(SiteState::Disabled))
    }

    /// `systemctl reload`, never restart. Failure is only a warning: the
    /// change is already on disk.
    pub async fn reload(&self, server: ServerType) -> bool {
        let cmd = ShellCommand::root("systemctl", ["reload", server.service_name()]);
        match self.executor.run_checked(&cmd).await {
            Ok(_) => {
                info!("{} reloaded", server.service_name());
                true
            }
            Err(e) => {
                warn!("Reload of {} failed, check the service manually: {}", server.service_name(), e);
                false
            }
        }
    }
}
