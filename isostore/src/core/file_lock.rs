//! Exclusive advisory locking for sandbox roots
//!
//! A store opened in exclusive mode holds one of these for as long as its
//! handle is live, so a second manager over the same sandbox fails to
//! initialize instead of silently sharing it.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum FileLockError {
    #[error("Lock timeout after {seconds} seconds: {path}")]
    Timeout { path: String, seconds: u64 },

    #[error("Failed to acquire file lock: {reason}")]
    LockFailed { reason: String },
}

/// A file lock that automatically releases when dropped
#[derive(Debug)]
pub struct FileLock {
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
    locked: bool,
}

impl FileLock {
    /// Acquire the lock, creating the lock file if needed and retrying until
    /// `timeout_seconds` have passed
    pub fn acquire<P: AsRef<Path>>(path: P, timeout_seconds: u64) -> Result<Self, FileLockError> {
        let path = path.as_ref();
        debug!("Acquiring store lock: {:?}", path);

        let timeout = Duration::from_secs(timeout_seconds);
        let start = Instant::now();
        loop {
            match Self::try_acquire(path) {
                Ok(file) => {
                    debug!("Acquired store lock: {:?}", path);
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                        locked: true,
                    });
                }
                Err(e) if is_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(FileLockError::Timeout {
                            path: path.to_string_lossy().to_string(),
                            seconds: timeout_seconds,
                        });
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    return Err(FileLockError::LockFailed {
                        reason: format!("{}: {}", path.display(), e),
                    });
                }
            }
        }
    }

    #[cfg(unix)]
    fn try_acquire(path: &Path) -> io::Result<File> {
        use std::os::unix::io::AsRawFd;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            Ok(file)
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Windows: an unshared handle is the lock
    #[cfg(windows)]
    fn try_acquire(path: &Path) -> io::Result<File> {
        use std::os::windows::fs::OpenOptionsExt;

        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .share_mode(0)
            .open(path)
    }

    #[cfg(not(any(unix, windows)))]
    fn try_acquire(_path: &Path) -> io::Result<File> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "exclusive store locks are not supported on this platform",
        ))
    }

    /// Release the lock explicitly (usually not needed due to Drop)
    ///
    /// On Windows the handle itself is the lock and is only freed on drop.
    pub fn release(&mut self) -> io::Result<()> {
        if !self.locked {
            return Ok(());
        }

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let result = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
            if result != 0 {
                return Err(io::Error::last_os_error());
            }
        }

        self.locked = false;
        debug!("Released store lock: {:?}", self.path);
        Ok(())
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to release store lock {:?} on drop: {}", self.path, e);
        }
    }
}

fn is_contended(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.kind() == io::ErrorKind::WouldBlock
    }
    #[cfg(windows)]
    {
        // ERROR_SHARING_VIOLATION
        err.raw_os_error() == Some(32)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = err;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_creates_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("store.lock");

        let _lock = FileLock::acquire(&path, 1).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_contended_lock_times_out() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("store.lock");

        let _held = FileLock::acquire(&path, 1).unwrap();

        let start = Instant::now();
        let result = FileLock::acquire(&path, 0);
        assert!(matches!(result, Err(FileLockError::Timeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_release_on_drop() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("store.lock");

        {
            let _lock = FileLock::acquire(&path, 1).unwrap();
        }

        assert!(FileLock::acquire(&path, 0).is_ok());
    }

    #[test]
    fn test_explicit_release_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let mut lock = FileLock::acquire(temp.path().join("store.lock"), 1).unwrap();

        lock.release().unwrap();
        lock.release().unwrap();
    }

    #[test]
    fn test_missing_parent_fails() {
        let temp = tempfile::tempdir().unwrap();
        let result = FileLock::acquire(temp.path().join("missing").join("store.lock"), 0);
        assert!(matches!(result, Err(FileLockError::LockFailed { .. })));
    }
}
