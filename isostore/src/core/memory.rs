//! In-memory sandbox store
//!
//! [`MemoryStore`] is the sandbox area itself and outlives any handle opened
//! on it; [`MemoryPersistence`] is a handle implementing the full provider
//! contract. File contents are shared buffers, so streams observe writes made
//! through other streams on the same file, much like the host filesystem.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use super::errors::{PersistenceError, PersistenceResult};
use super::open_mode::OpenMode;
use super::path::SandboxPath;
use super::provider::PersistenceProvider;

type Content = Arc<Mutex<Vec<u8>>>;

#[derive(Debug, Clone)]
enum Node {
    Directory,
    File(Content),
}

/// Entries keyed by their `/`-joined path; the root is implicit
#[derive(Debug, Default)]
struct Tree {
    nodes: BTreeMap<String, Node>,
}

impl Tree {
    fn is_dir(&self, key: &str) -> bool {
        key.is_empty() || matches!(self.nodes.get(key), Some(Node::Directory))
    }

    fn file(&self, key: &str) -> Option<&Content> {
        match self.nodes.get(key) {
            Some(Node::File(content)) => Some(content),
            _ => None,
        }
    }

    fn parent_is_dir(&self, path: &SandboxPath) -> bool {
        path.parent().is_some_and(|parent| self.is_dir(&parent.key()))
    }

    /// Immediate children of a directory as (name, is_directory)
    fn children(&self, key: &str) -> Vec<(String, bool)> {
        let prefix = if key.is_empty() {
            String::new()
        } else {
            format!("{key}/")
        };

        self.nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter_map(|(k, node)| {
                let name = &k[prefix.len()..];
                if name.contains('/') {
                    None
                } else {
                    Some((name.to_string(), matches!(node, Node::Directory)))
                }
            })
            .collect()
    }
}

/// A sandbox area held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tree: Arc<Mutex<Tree>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Persistence provider over a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryPersistence {
    store: Option<MemoryStore>,
}

impl MemoryPersistence {
    /// Open a handle on a fresh, empty store
    pub fn new() -> Self {
        Self::open(&MemoryStore::new())
    }

    /// Open a handle on an existing store
    pub fn open(store: &MemoryStore) -> Self {
        debug!("Opened in-memory sandbox store");
        Self {
            store: Some(store.clone()),
        }
    }

    fn tree(&self) -> PersistenceResult<MutexGuard<'_, Tree>> {
        let store = self.store.as_ref().ok_or(PersistenceError::Disposed)?;
        store.tree.lock().map_err(|_| PersistenceError::Backend {
            path: String::new(),
            source: poisoned(),
        })
    }

    fn list_children(&self, path: &str, directories: bool) -> PersistenceResult<Vec<String>> {
        let tree = self.tree()?;
        let target = SandboxPath::parse(path)?;
        let key = target.key();
        if !tree.is_dir(&key) {
            return Err(PersistenceError::not_found(path));
        }

        Ok(tree
            .children(&key)
            .into_iter()
            .filter(|(_, is_dir)| *is_dir == directories)
            .map(|(name, _)| name)
            .collect())
    }
}

impl Default for MemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceProvider for MemoryPersistence {
    type InputStream = MemoryInputStream;
    type OutputStream = MemoryOutputStream;

    fn file_exists(&self, path: &str) -> PersistenceResult<bool> {
        let tree = self.tree()?;
        Ok(SandboxPath::parse_entry(path)
            .map(|p| tree.file(&p.key()).is_some())
            .unwrap_or(false))
    }

    fn create_file(&self, path: &str) -> PersistenceResult<()> {
        trace!("create_file {}", path);
        let mut tree = self.tree()?;
        let target = SandboxPath::parse_entry(path)?;
        let key = target.key();

        if let Some(content) = tree.file(&key) {
            lock_content(content)?.clear();
            return Ok(());
        }
        if tree.is_dir(&key) {
            return Err(is_a_directory(path));
        }
        if !tree.parent_is_dir(&target) {
            return Err(PersistenceError::not_found(path));
        }
        tree.nodes.insert(key, Node::File(Content::default()));
        Ok(())
    }

    fn delete_file(&self, path: &str) -> PersistenceResult<()> {
        trace!("delete_file {}", path);
        let mut tree = self.tree()?;
        let Ok(target) = SandboxPath::parse_entry(path) else {
            return Ok(());
        };
        let key = target.key();
        if tree.file(&key).is_some() {
            tree.nodes.remove(&key);
        }
        Ok(())
    }

    fn directory_exists(&self, path: &str) -> PersistenceResult<bool> {
        let tree = self.tree()?;
        Ok(SandboxPath::parse(path)
            .map(|p| tree.is_dir(&p.key()))
            .unwrap_or(false))
    }

    fn create_directory(&self, path: &str) -> PersistenceResult<()> {
        trace!("create_directory {}", path);
        let mut tree = self.tree()?;
        let target = SandboxPath::parse(path)?;

        let mut key = String::new();
        let mut missing = Vec::new();
        for segment in target.segments() {
            if !key.is_empty() {
                key.push('/');
            }
            key.push_str(segment);
            match tree.nodes.get(&key) {
                Some(Node::File(_)) => return Err(PersistenceError::already_exists(path)),
                Some(Node::Directory) => {}
                None => missing.push(key.clone()),
            }
        }

        for key in missing {
            tree.nodes.insert(key, Node::Directory);
        }
        Ok(())
    }

    fn delete_directory(&self, path: &str) -> PersistenceResult<()> {
        trace!("delete_directory {}", path);
        let mut tree = self.tree()?;
        let target = SandboxPath::parse(path)?;
        if target.is_root() {
            return Err(PersistenceError::InvalidPath {
                path: path.to_string(),
                reason: "the sandbox root cannot be deleted".to_string(),
            });
        }
        let key = target.key();
        if !tree.is_dir(&key) {
            return Err(PersistenceError::not_found(path));
        }

        let children = tree.children(&key);
        for (name, _) in children.iter().filter(|(_, is_dir)| !*is_dir) {
            tree.nodes.remove(&format!("{key}/{name}"));
        }

        if children.iter().any(|(_, is_dir)| *is_dir) {
            return Err(PersistenceError::DirectoryNotEmpty {
                path: path.to_string(),
            });
        }

        tree.nodes.remove(&key);
        Ok(())
    }

    fn get_output_stream(
        &self,
        path: &str,
        mode: OpenMode,
    ) -> PersistenceResult<MemoryOutputStream> {
        trace!("get_output_stream {} ({})", path, mode);
        let mut tree = self.tree()?;
        let target = SandboxPath::parse_entry(path)?;
        let key = target.key();

        if tree.is_dir(&key) {
            return Err(is_a_directory(path));
        }

        let content = match tree.file(&key) {
            Some(_) if mode == OpenMode::CreateNew => {
                return Err(PersistenceError::already_exists(path))
            }
            Some(content) => Arc::clone(content),
            None if !mode.creates() => return Err(PersistenceError::not_found(path)),
            None if !tree.parent_is_dir(&target) => {
                return Err(PersistenceError::not_found(path))
            }
            None => {
                let content = Content::default();
                tree.nodes.insert(key, Node::File(Arc::clone(&content)));
                content
            }
        };

        let position = {
            let mut data = lock_content(&content)?;
            if mode.truncates() {
                data.clear();
            }
            if mode == OpenMode::Append {
                data.len() as u64
            } else {
                0
            }
        };

        Ok(MemoryOutputStream {
            content,
            position,
            append: mode == OpenMode::Append,
        })
    }

    fn get_input_stream(&self, path: &str) -> PersistenceResult<MemoryInputStream> {
        trace!("get_input_stream {}", path);
        let tree = self.tree()?;
        let key = SandboxPath::parse_entry(path)?.key();
        let content = tree
            .file(&key)
            .ok_or_else(|| PersistenceError::not_found(path))?;

        Ok(MemoryInputStream {
            content: Arc::clone(content),
            position: 0,
        })
    }

    fn get_file_length(&self, path: &str) -> PersistenceResult<u64> {
        let tree = self.tree()?;
        let Ok(target) = SandboxPath::parse_entry(path) else {
            return Ok(0);
        };
        match tree.file(&target.key()) {
            Some(content) => Ok(lock_content(content)?.len() as u64),
            None => Ok(0),
        }
    }

    fn list_sub_directories(&self, path: &str) -> PersistenceResult<Vec<String>> {
        self.list_children(path, true)
    }

    fn list_files(&self, path: &str) -> PersistenceResult<Vec<String>> {
        self.list_children(path, false)
    }

    fn rename_file(&self, src: &str, dst: &str) -> PersistenceResult<()> {
        trace!("rename_file {} -> {}", src, dst);
        let mut tree = self.tree()?;
        let src_key = SandboxPath::parse_entry(src)?.key();
        let dst_path = SandboxPath::parse_entry(dst)?;
        let dst_key = dst_path.key();

        if tree.file(&src_key).is_none() {
            return Err(PersistenceError::not_found(src));
        }
        if tree.nodes.contains_key(&dst_key) {
            return Err(PersistenceError::already_exists(dst));
        }
        if !tree.parent_is_dir(&dst_path) {
            return Err(PersistenceError::not_found(dst));
        }

        if let Some(node) = tree.nodes.remove(&src_key) {
            tree.nodes.insert(dst_key, node);
        }
        Ok(())
    }

    fn copy_file(&self, src: &str, dst: &str, overwrite: bool) -> PersistenceResult<()> {
        trace!("copy_file {} -> {} (overwrite: {})", src, dst, overwrite);
        let mut tree = self.tree()?;
        let src_key = SandboxPath::parse_entry(src)?.key();
        let dst_path = SandboxPath::parse_entry(dst)?;
        let dst_key = dst_path.key();

        let bytes = match tree.file(&src_key) {
            Some(content) => lock_content(content)?.clone(),
            None => return Err(PersistenceError::not_found(src)),
        };

        match tree.nodes.get(&dst_key) {
            Some(Node::Directory) => Err(PersistenceError::already_exists(dst)),
            Some(Node::File(_)) if !overwrite => Err(PersistenceError::already_exists(dst)),
            Some(Node::File(content)) => {
                *lock_content(content)? = bytes;
                Ok(())
            }
            None if !tree.parent_is_dir(&dst_path) => Err(PersistenceError::not_found(dst)),
            None => {
                tree.nodes
                    .insert(dst_key, Node::File(Arc::new(Mutex::new(bytes))));
                Ok(())
            }
        }
    }

    fn dispose(&mut self) {
        if self.store.take().is_some() {
            debug!("Released in-memory sandbox store");
        }
    }

    fn is_disposed(&self) -> bool {
        self.store.is_none()
    }
}

impl Drop for MemoryPersistence {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Write-only stream over an in-memory file
#[derive(Debug)]
pub struct MemoryOutputStream {
    content: Content,
    position: u64,
    append: bool,
}

impl Write for MemoryOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut data = self.content.lock().map_err(|_| poisoned())?;
        if self.append {
            self.position = data.len() as u64;
        }

        let start = usize::try_from(self.position)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "position out of range"))?;
        let end = start
            .checked_add(buf.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "write past end of range"))?;
        if end > data.len() {
            let additional = end - data.len();
            data.try_reserve(additional).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::OutOfMemory,
                    format!("cannot grow in-memory file to {end} bytes: {e}"),
                )
            })?;
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);

        self.position = end as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryOutputStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.content.lock().map_err(|_| poisoned())?.len() as u64;
        self.position = seek_position(self.position, len, pos)?;
        Ok(self.position)
    }
}

/// Read-only stream over an in-memory file
#[derive(Debug)]
pub struct MemoryInputStream {
    content: Content,
    position: u64,
}

impl Read for MemoryInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.content.lock().map_err(|_| poisoned())?;
        let start = match usize::try_from(self.position) {
            Ok(start) if start < data.len() => start,
            _ => return Ok(0),
        };

        let count = buf.len().min(data.len() - start);
        buf[..count].copy_from_slice(&data[start..start + count]);
        self.position += count as u64;
        Ok(count)
    }
}

impl Seek for MemoryInputStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.content.lock().map_err(|_| poisoned())?.len() as u64;
        self.position = seek_position(self.position, len, pos)?;
        Ok(self.position)
    }
}

fn seek_position(current: u64, len: u64, pos: SeekFrom) -> io::Result<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => Some(offset),
        SeekFrom::End(delta) => len.checked_add_signed(delta),
        SeekFrom::Current(delta) => current.checked_add_signed(delta),
    };
    target.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid seek to a negative or overflowing position",
        )
    })
}

fn lock_content(content: &Content) -> PersistenceResult<MutexGuard<'_, Vec<u8>>> {
    content.lock().map_err(|_| PersistenceError::Backend {
        path: String::new(),
        source: poisoned(),
    })
}

fn poisoned() -> io::Error {
    io::Error::other("in-memory store lock poisoned")
}

fn is_a_directory(path: &str) -> PersistenceError {
    PersistenceError::Backend {
        path: path.to_string(),
        source: io::Error::other("path is a directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_outlives_handle() {
        let store = MemoryStore::new();
        {
            let mut first = MemoryPersistence::open(&store);
            first.create_directory("kept").unwrap();
            first.create_file("kept/file").unwrap();
            first.dispose();
        }

        let second = MemoryPersistence::open(&store);
        assert!(second.directory_exists("kept").unwrap());
        assert!(second.file_exists("kept/file").unwrap());
    }

    #[test]
    fn test_streams_share_content() {
        let provider = MemoryPersistence::new();
        let mut writer = provider
            .get_output_stream("shared", OpenMode::Create)
            .unwrap();
        let mut reader = provider.get_input_stream("shared").unwrap();

        writer.write_all(b"first").unwrap();
        let mut buf = String::new();
        reader.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "first");
    }

    #[test]
    fn test_append_always_writes_at_end() {
        let provider = MemoryPersistence::new();
        let mut stream = provider
            .get_output_stream("log", OpenMode::Append)
            .unwrap();
        stream.write_all(b"one").unwrap();
        stream.seek(SeekFrom::Start(0)).unwrap();
        stream.write_all(b"two").unwrap();
        drop(stream);

        let mut buf = Vec::new();
        provider
            .get_input_stream("log")
            .unwrap()
            .read_to_end(&mut buf)
            .unwrap();
        assert_eq!(buf, b"onetwo");
    }

    #[test]
    fn test_seek_past_end_zero_fills() {
        let provider = MemoryPersistence::new();
        let mut stream = provider
            .get_output_stream("sparse", OpenMode::Create)
            .unwrap();
        stream.seek(SeekFrom::Start(3)).unwrap();
        stream.write_all(b"x").unwrap();
        drop(stream);

        assert_eq!(provider.get_file_length("sparse").unwrap(), 4);
        assert!(stream_seek_rejects_negative(&provider));
    }

    #[test]
    fn test_write_at_huge_offset_fails_without_panicking() {
        let provider = MemoryPersistence::new();
        let mut stream = provider
            .get_output_stream("huge", OpenMode::Create)
            .unwrap();
        stream.write_all(b"keep").unwrap();

        // usize overflow on the end offset
        stream.seek(SeekFrom::Start(u64::MAX)).unwrap();
        assert!(stream.write(b"x").is_err());

        // beyond the largest allocatable buffer
        stream.seek(SeekFrom::Start(1 << 63)).unwrap();
        assert!(stream.write(b"x").is_err());

        drop(stream);
        assert_eq!(provider.get_file_length("huge").unwrap(), 4);
    }

    fn stream_seek_rejects_negative(provider: &MemoryPersistence) -> bool {
        let mut stream = provider.get_input_stream("sparse").unwrap();
        stream.seek(SeekFrom::Current(-1)).is_err()
    }

    #[test]
    fn test_children_only_immediate() {
        let provider = MemoryPersistence::new();
        provider.create_directory("a/b/c").unwrap();
        provider.create_directory("ab").unwrap();
        provider.create_file("a/file").unwrap();

        assert_eq!(provider.list_sub_directories("").unwrap(), ["a", "ab"]);
        assert_eq!(provider.list_sub_directories("a").unwrap(), ["b"]);
        assert_eq!(provider.list_files("a").unwrap(), ["file"]);
    }

    #[test]
    fn test_directory_path_is_not_a_file() {
        let provider = MemoryPersistence::new();
        provider.create_directory("dir").unwrap();

        assert!(!provider.file_exists("dir").unwrap());
        assert!(matches!(
            provider.create_file("dir"),
            Err(PersistenceError::Backend { .. })
        ));
        assert!(matches!(
            provider.get_input_stream("dir"),
            Err(PersistenceError::NotFound { .. })
        ));
        assert_eq!(provider.get_file_length("dir").unwrap(), 0);
    }
}
