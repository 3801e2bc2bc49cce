//! Sandbox-relative path names.
//!
//! Callers hand in opaque strings using the host separator convention. Before
//! any backend is touched the string is split into normal segments; anything
//! that would address a location outside the sandbox root is rejected.

use std::path::{Component, Path, PathBuf};

use super::errors::{PersistenceError, PersistenceResult};

/// A validated path inside the sandbox namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPath {
    segments: Vec<String>,
}

impl SandboxPath {
    /// Parse a caller-supplied path
    ///
    /// The empty string (or a path made only of `.` components) names the
    /// sandbox root.
    pub fn parse(path: &str) -> PersistenceResult<Self> {
        if path.contains('\0') {
            return Err(invalid(path, "contains a NUL byte"));
        }

        let mut segments = Vec::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(name) => {
                    let name = name
                        .to_str()
                        .ok_or_else(|| invalid(path, "is not valid UTF-8"))?;
                    segments.push(name.to_string());
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(invalid(path, "parent directory references are not allowed"))
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid(path, "absolute paths are not allowed"))
                }
            }
        }

        Ok(Self { segments })
    }

    /// Parse a path that must name an entry below the root
    pub fn parse_entry(path: &str) -> PersistenceResult<Self> {
        let parsed = Self::parse(path)?;
        if parsed.is_root() {
            return Err(invalid(path, "does not name an entry"));
        }
        Ok(parsed)
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Canonical `/`-joined form, empty for the root
    pub fn key(&self) -> String {
        self.segments.join("/")
    }

    /// Containing directory, `None` for the root
    pub fn parent(&self) -> Option<SandboxPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Resolve against a host directory acting as sandbox root
    pub fn to_host(&self, root: &Path) -> PathBuf {
        let mut host = root.to_path_buf();
        host.extend(&self.segments);
        host
    }
}

fn invalid(path: &str, reason: &str) -> PersistenceError {
    PersistenceError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested() {
        let path = SandboxPath::parse("data/tables/users.bin").unwrap();
        assert_eq!(path.segments(), ["data", "tables", "users.bin"]);
        assert_eq!(path.key(), "data/tables/users.bin");
        assert_eq!(path.parent().unwrap().key(), "data/tables");
    }

    #[test]
    fn test_current_dir_components_ignored() {
        let path = SandboxPath::parse("./data/./file").unwrap();
        assert_eq!(path.key(), "data/file");
        assert!(SandboxPath::parse(".").unwrap().is_root());
        assert!(SandboxPath::parse("").unwrap().is_root());
    }

    #[test]
    fn test_escaping_paths_rejected() {
        for bad in ["../outside", "data/../../etc", "/etc/passwd", "a\0b"] {
            assert!(
                matches!(
                    SandboxPath::parse(bad),
                    Err(PersistenceError::InvalidPath { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_entry_requires_name() {
        assert!(SandboxPath::parse_entry("").is_err());
        assert!(SandboxPath::parse_entry("file").is_ok());
    }

    #[test]
    fn test_root_has_no_parent() {
        let root = SandboxPath::parse("").unwrap();
        assert!(root.parent().is_none());

        let top = SandboxPath::parse("top").unwrap();
        assert!(top.parent().unwrap().is_root());
    }

    #[test]
    fn test_to_host() {
        let path = SandboxPath::parse("a/b").unwrap();
        let host = path.to_host(Path::new("/sandbox"));
        assert_eq!(host, PathBuf::from("/sandbox").join("a").join("b"));
    }
}
