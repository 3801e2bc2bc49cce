//! Persistence provider interface
//!
//! This module defines the contract every sandbox backend fulfils, letting
//! storage engines run unchanged over a host directory, an in-memory tree, or
//! any other isolated store.

use std::io::{Read, Seek, Write};

use super::errors::PersistenceResult;
use super::open_mode::OpenMode;

/// Trait for file and directory primitives over a sandboxed store
///
/// All paths are interpreted relative to the sandbox root. Implementations
/// own a single storage handle which is released by [`dispose`](Self::dispose)
/// or on drop; every other method returns
/// [`PersistenceError::Disposed`](super::PersistenceError::Disposed) once the
/// handle is gone.
///
/// Streams handed out are owned by the caller and closed when dropped.
pub trait PersistenceProvider: Send + Sync {
    /// Read-only stream type
    type InputStream: Read + Seek + Send;

    /// Write-only stream type
    type OutputStream: Write + Seek + Send;

    /// Check whether a file exists
    ///
    /// Missing and invalid paths both report `false`.
    fn file_exists(&self, path: &str) -> PersistenceResult<bool>;

    /// Create an empty file, truncating any existing content
    ///
    /// # Arguments
    /// * `path` - File to create; its parent directory must exist
    ///
    /// # Returns
    /// * `Ok(())` - File exists and is empty
    /// * `Err(PersistenceError)` - Invalid path or missing parent directory
    fn create_file(&self, path: &str) -> PersistenceResult<()>;

    /// Delete a file; absent files are not an error
    fn delete_file(&self, path: &str) -> PersistenceResult<()>;

    /// Check whether a directory exists
    fn directory_exists(&self, path: &str) -> PersistenceResult<bool>;

    /// Create a directory together with any missing intermediates
    ///
    /// # Returns
    /// * `Ok(())` - Directory exists
    /// * `Err(PersistenceError::AlreadyExists)` - A file occupies the path
    fn create_directory(&self, path: &str) -> PersistenceResult<()>;

    /// Delete a directory after removing the files directly inside it
    ///
    /// Subdirectories are not descended into. A directory that still holds
    /// subdirectories once its files are gone is left in place and
    /// [`PersistenceError::DirectoryNotEmpty`](super::PersistenceError::DirectoryNotEmpty)
    /// is returned.
    fn delete_directory(&self, path: &str) -> PersistenceResult<()>;

    /// Open a write-only stream
    ///
    /// # Arguments
    /// * `path` - Target file
    /// * `mode` - How the stream relates to existing content
    ///
    /// # Returns
    /// * `Ok(OutputStream)` - Stream positioned according to `mode`
    /// * `Err(PersistenceError::AlreadyExists)` - `CreateNew` on an existing file
    /// * `Err(PersistenceError::NotFound)` - `Open`/`Truncate` on a missing file
    fn get_output_stream(&self, path: &str, mode: OpenMode)
        -> PersistenceResult<Self::OutputStream>;

    /// Open a read-only stream on an existing file
    fn get_input_stream(&self, path: &str) -> PersistenceResult<Self::InputStream>;

    /// Length of a file in bytes, or 0 if it does not exist
    fn get_file_length(&self, path: &str) -> PersistenceResult<u64>;

    /// Names of the immediate child directories of `path`, sorted
    fn list_sub_directories(&self, path: &str) -> PersistenceResult<Vec<String>>;

    /// Names of the immediate child files of `path`, sorted
    fn list_files(&self, path: &str) -> PersistenceResult<Vec<String>>;

    /// Move a file to a new path
    ///
    /// # Returns
    /// * `Err(PersistenceError::NotFound)` - `src` is missing
    /// * `Err(PersistenceError::AlreadyExists)` - `dst` is taken
    fn rename_file(&self, src: &str, dst: &str) -> PersistenceResult<()>;

    /// Copy a file's contents to a new path
    ///
    /// # Arguments
    /// * `src` - Existing file
    /// * `dst` - Destination path
    /// * `overwrite` - Replace `dst` if it is already a file
    fn copy_file(&self, src: &str, dst: &str, overwrite: bool) -> PersistenceResult<()>;

    /// Release the storage handle; repeated calls do nothing
    fn dispose(&mut self);

    /// Whether [`dispose`](Self::dispose) has run
    fn is_disposed(&self) -> bool;
}
