use std::{
    fs::{self, File, OpenOptions},
    os::unix::io::AsRawFd,
    path::{Path, PathBuf},
};

use log::debug;
use nix::{
    errno::Errno,
    fcntl::{flock, FlockArg},
};

use crate::error::SiteError;

/// Exclusive advisory lock on one domain, held until dropped.
///
/// Two invocations changing the same site at once fail fast with
/// [`SiteError::Busy`] instead of racing on the enabled directory.
#[derive(Debug)]
pub struct DomainLock {
    _file: File,
    path: PathBuf,
}

impl DomainLock {
    pub fn acquire(dir: &Path, domain: &str) -> Result<Self, SiteError> {
        fs::create_dir_all(dir).map_err(|e| SiteError::io(dir, e))?;

        let path = dir.join(format!("{}.lock", domain));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|e| SiteError::io(&path, e))?;

        match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => {}
            Err(Errno::EWOULDBLOCK) => return Err(SiteError::Busy(domain.to_string())),
            Err(e) => return Err(SiteError::io(&path, e.into())),
        }

        debug!("Lock acquired: {:?}", path);
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
