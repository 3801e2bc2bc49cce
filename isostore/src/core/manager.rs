//! Directory-backed sandbox store.
//!
//! [`PersistenceManager`] roots every path under a per-application directory
//! resolved from a [`SandboxConfig`]. The directory is the sandbox: paths that
//! would leave it are rejected before the host filesystem is touched.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::errors::{PersistenceError, PersistenceResult};
use super::file_lock::FileLock;
use super::open_mode::OpenMode;
use super::path::SandboxPath;
use super::provider::PersistenceProvider;
use crate::config::{paths, SandboxConfig};

#[cfg(windows)]
const FILE_SHARE_READ: u32 = 0x0000_0001;
#[cfg(windows)]
const FILE_SHARE_WRITE: u32 = 0x0000_0002;

/// Open connection to a sandbox root
#[derive(Debug)]
struct StoreHandle {
    root: PathBuf,
    lock: Option<FileLock>,
}

/// Persistence provider over a host directory sandbox
#[derive(Debug)]
pub struct PersistenceManager {
    handle: Option<StoreHandle>,
}

impl PersistenceManager {
    /// Open the sandbox described by the default configuration
    pub fn new() -> PersistenceResult<Self> {
        Self::open(&SandboxConfig::default())
    }

    /// Open the sandbox for `config`, creating its root if needed
    ///
    /// # Returns
    /// * `Ok(PersistenceManager)` - Live handle to the sandbox
    /// * `Err(PersistenceError::Initialization)` - No usable base directory,
    ///   the root could not be created, or the exclusive lock is held elsewhere
    pub fn open(config: &SandboxConfig) -> PersistenceResult<Self> {
        let root = config.resolve_root().map_err(initialization)?;
        paths::ensure_directory_exists(&root).map_err(initialization)?;

        let lock = if config.exclusive {
            let lock_path = config.resolve_lock_path().map_err(initialization)?;
            let lock = FileLock::acquire(&lock_path, config.lock_timeout_secs).map_err(|e| {
                PersistenceError::Initialization {
                    reason: e.to_string(),
                }
            })?;
            Some(lock)
        } else {
            None
        };

        debug!("Opened sandbox store at {:?}", root);
        Ok(Self {
            handle: Some(StoreHandle { root, lock }),
        })
    }

    /// Host directory acting as the sandbox root
    pub fn root(&self) -> PersistenceResult<&Path> {
        self.handle
            .as_ref()
            .map(|handle| handle.root.as_path())
            .ok_or(PersistenceError::Disposed)
    }

    /// Whether this handle holds the exclusive store lock
    pub fn is_exclusive(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| handle.lock.is_some())
    }

    fn resolve(&self, path: &str) -> PersistenceResult<PathBuf> {
        let root = self.root()?;
        Ok(SandboxPath::parse(path)?.to_host(root))
    }

    fn resolve_entry(&self, path: &str) -> PersistenceResult<PathBuf> {
        let root = self.root()?;
        Ok(SandboxPath::parse_entry(path)?.to_host(root))
    }

    /// Host path of an existing file; invalid paths count as absent
    fn existing_file(&self, path: &str) -> PersistenceResult<Option<PathBuf>> {
        let root = self.root()?;
        Ok(SandboxPath::parse_entry(path)
            .ok()
            .map(|p| p.to_host(root))
            .filter(|host| host.is_file()))
    }

    fn list_children(&self, path: &str, directories: bool) -> PersistenceResult<Vec<String>> {
        let host = self.resolve(path)?;
        if !host.is_dir() {
            return Err(PersistenceError::not_found(path));
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&host).map_err(|e| PersistenceError::from_io(path, e))? {
            let entry = entry.map_err(|e| PersistenceError::from_io(path, e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| PersistenceError::from_io(path, e))?;
            if file_type.is_dir() == directories {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl PersistenceProvider for PersistenceManager {
    type InputStream = File;
    type OutputStream = File;

    fn file_exists(&self, path: &str) -> PersistenceResult<bool> {
        Ok(self.existing_file(path)?.is_some())
    }

    fn create_file(&self, path: &str) -> PersistenceResult<()> {
        trace!("create_file {}", path);
        let host = self.resolve_entry(path)?;
        File::create(&host).map_err(|e| PersistenceError::from_io(path, e))?;
        Ok(())
    }

    fn delete_file(&self, path: &str) -> PersistenceResult<()> {
        trace!("delete_file {}", path);
        let Some(host) = self.existing_file(path)? else {
            return Ok(());
        };
        match fs::remove_file(&host) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistenceError::from_io(path, e)),
        }
    }

    fn directory_exists(&self, path: &str) -> PersistenceResult<bool> {
        let root = self.root()?;
        Ok(SandboxPath::parse(path)
            .map(|p| p.to_host(root).is_dir())
            .unwrap_or(false))
    }

    fn create_directory(&self, path: &str) -> PersistenceResult<()> {
        trace!("create_directory {}", path);
        let root = self.root()?;
        let target = SandboxPath::parse(path)?;

        let mut host = root.to_path_buf();
        for segment in target.segments() {
            host.push(segment);
            if host.is_file() {
                return Err(PersistenceError::already_exists(path));
            }
        }

        fs::create_dir_all(&host).map_err(|e| PersistenceError::from_io(path, e))
    }

    fn delete_directory(&self, path: &str) -> PersistenceResult<()> {
        trace!("delete_directory {}", path);
        let target = SandboxPath::parse(path)?;
        if target.is_root() {
            return Err(PersistenceError::InvalidPath {
                path: path.to_string(),
                reason: "the sandbox root cannot be deleted".to_string(),
            });
        }
        let host = target.to_host(self.root()?);
        if !host.is_dir() {
            return Err(PersistenceError::not_found(path));
        }

        for name in self.list_children(path, false)? {
            let child = host.join(&name);
            fs::remove_file(&child).map_err(|e| {
                PersistenceError::from_io(&format!("{}/{}", target.key(), name), e)
            })?;
        }

        if !self.list_children(path, true)?.is_empty() {
            return Err(PersistenceError::DirectoryNotEmpty {
                path: path.to_string(),
            });
        }

        fs::remove_dir(&host).map_err(|e| PersistenceError::from_io(path, e))
    }

    fn get_output_stream(&self, path: &str, mode: OpenMode) -> PersistenceResult<File> {
        trace!("get_output_stream {} ({})", path, mode);
        let host = self.resolve_entry(path)?;
        output_options(mode)
            .open(&host)
            .map_err(|e| PersistenceError::from_io(path, e))
    }

    fn get_input_stream(&self, path: &str) -> PersistenceResult<File> {
        trace!("get_input_stream {}", path);
        let host = self.resolve_entry(path)?;
        if host.is_dir() {
            return Err(PersistenceError::not_found(path));
        }
        input_options()
            .open(&host)
            .map_err(|e| PersistenceError::from_io(path, e))
    }

    fn get_file_length(&self, path: &str) -> PersistenceResult<u64> {
        let Some(host) = self.existing_file(path)? else {
            return Ok(0);
        };
        let file = input_options()
            .open(&host)
            .map_err(|e| PersistenceError::from_io(path, e))?;
        let metadata = file
            .metadata()
            .map_err(|e| PersistenceError::from_io(path, e))?;
        Ok(metadata.len())
    }

    fn list_sub_directories(&self, path: &str) -> PersistenceResult<Vec<String>> {
        self.list_children(path, true)
    }

    fn list_files(&self, path: &str) -> PersistenceResult<Vec<String>> {
        self.list_children(path, false)
    }

    fn rename_file(&self, src: &str, dst: &str) -> PersistenceResult<()> {
        trace!("rename_file {} -> {}", src, dst);
        let src_host = self.resolve_entry(src)?;
        let dst_host = self.resolve_entry(dst)?;

        if !src_host.is_file() {
            return Err(PersistenceError::not_found(src));
        }
        if dst_host.exists() {
            return Err(PersistenceError::already_exists(dst));
        }

        fs::rename(&src_host, &dst_host).map_err(|e| PersistenceError::from_io(dst, e))
    }

    fn copy_file(&self, src: &str, dst: &str, overwrite: bool) -> PersistenceResult<()> {
        trace!("copy_file {} -> {} (overwrite: {})", src, dst, overwrite);
        let src_host = self.resolve_entry(src)?;
        let dst_host = self.resolve_entry(dst)?;

        if !src_host.is_file() {
            return Err(PersistenceError::not_found(src));
        }
        if dst_host.is_dir() || (dst_host.exists() && !overwrite) {
            return Err(PersistenceError::already_exists(dst));
        }
        if src_host == dst_host {
            // copying onto itself would truncate the source
            return Ok(());
        }

        fs::copy(&src_host, &dst_host)
            .map(|_| ())
            .map_err(|e| PersistenceError::from_io(dst, e))
    }

    fn dispose(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Released sandbox store at {:?}", handle.root);
        }
    }

    fn is_disposed(&self) -> bool {
        self.handle.is_none()
    }
}

impl Drop for PersistenceManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Write-only options for `mode`, shared-read for other handles
fn output_options(mode: OpenMode) -> OpenOptions {
    #[cfg_attr(not(windows), allow(unused_mut))]
    let mut options = mode.to_open_options();
    #[cfg(windows)]
    {
        use std::os::windows::fs::OpenOptionsExt;
        options.share_mode(FILE_SHARE_READ);
    }
    options
}

/// Read-only options, shared read/write for other handles
fn input_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.read(true);
    #[cfg(windows)]
    {
        use std::os::windows::fs::OpenOptionsExt;
        options.share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE);
    }
    options
}

fn initialization(err: anyhow::Error) -> PersistenceError {
    PersistenceError::Initialization {
        reason: format!("{err:#}"),
    }
}
