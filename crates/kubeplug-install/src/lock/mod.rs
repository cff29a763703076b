//! Per-plugin advisory lock files.
//!
//! A lock is a file created with `create_new` that records the holder's pid.
//! A lock left behind by a dead process is stale and is replaced. The file
//! is removed when the [`PluginLock`] is dropped.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::InstallError;

pub(crate) const LOCK_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lock");

/// Holds the advisory lock for one plugin name.
#[derive(Debug)]
pub struct PluginLock {
    path: PathBuf,
    _file: File,
}

impl PluginLock {
    /// Acquires the lock at `path` on behalf of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Busy`] when a live process holds the lock and
    /// [`InstallError::Io`] when the lock file cannot be created.
    pub fn acquire(name: &str, path: &Path) -> Result<Self, InstallError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(InstallError::io_with("create directory", parent))?;
        }
        match create(path)? {
            Some(file) => Ok(Self::held(name, path, file)),
            None => {
                reclaim_if_stale(name, path)?;
                create(path)?
                    .map(|file| Self::held(name, path, file))
                    .ok_or_else(|| busy(name, path))
            }
        }
    }

    /// Lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    fn held(name: &str, path: &Path, file: File) -> Self {
        info!(
            target: LOCK_TARGET,
            plugin = name,
            file = %path.display(),
            "acquired plugin lock"
        );
        Self {
            path: path.to_path_buf(),
            _file: file,
        }
    }
}

impl Drop for PluginLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => {
                warn!(
                    target: LOCK_TARGET,
                    file = %self.path.display(),
                    error = %error,
                    "failed to remove lock file"
                );
            }
            _ => {}
        }
    }
}

/// Creates the lock file, returning `None` when it already exists.
fn create(path: &Path) -> Result<Option<File>, InstallError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
        Err(error) => return Err(InstallError::io("create lock file", path, error)),
    };
    writeln!(file, "{}", std::process::id())
        .and_then(|()| file.sync_all())
        .map_err(InstallError::io_with("write lock file", path))?;
    Ok(Some(file))
}

fn reclaim_if_stale(name: &str, path: &Path) -> Result<(), InstallError> {
    if let Some(pid) = read_pid(path)
        && pid != 0
        && process_alive(pid)
    {
        info!(target: LOCK_TARGET, plugin = name, pid, "plugin lock held by live process");
        return Err(busy(name, path));
    }
    warn!(
        target: LOCK_TARGET,
        plugin = name,
        file = %path.display(),
        "removing stale plugin lock"
    );
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(InstallError::io("remove stale lock file", path, error)),
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse::<u32>().ok()
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn process_alive(pid: u32) -> bool {
    pid == std::process::id()
}

fn busy(name: &str, path: &Path) -> InstallError {
    InstallError::Busy {
        name: name.to_owned(),
        lock_path: path.to_path_buf(),
    }
}
