//! Cross-platform path utilities for sandbox roots
//!
//! This module resolves the per-user base directories that sandboxes are
//! created under, and validates the names that become sandbox directories.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use super::StoreScope;

/// Get the base directory that sandboxes of the given scope live under
///
/// This follows platform conventions:
/// - Local: ~/.local/share, %LOCALAPPDATA%, ~/Library/Application Support
/// - Roaming: ~/.local/share, %APPDATA%, ~/Library/Application Support
/// - Temporary: the system temp directory
pub fn get_scope_base_directory(scope: StoreScope) -> Result<PathBuf> {
    let base = match scope {
        StoreScope::Local => dirs::data_local_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
            .context("Could not determine local data directory")?,
        StoreScope::Roaming => dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
            .context("Could not determine roaming data directory")?,
        StoreScope::Temporary => std::env::temp_dir(),
    };

    Ok(base)
}

/// Check that an application name is usable as a single directory name
pub fn validate_application_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Application name cannot be empty");
    }
    if name == "." || name == ".." {
        bail!("Application name cannot be '{name}'");
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        bail!("Application name '{name}' contains unsupported character {bad:?}");
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {path:?}"))?;
    }
    if !path.is_dir() {
        bail!("Sandbox root {path:?} is not a directory");
    }
    Ok(())
}

/// Lock file guarding a sandbox, kept beside the root so it never shows up
/// inside the sandbox namespace
pub fn lock_file_path(base: &Path, application: &str) -> PathBuf {
    base.join(format!("{application}.lock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_base_directories() {
        let temp = get_scope_base_directory(StoreScope::Temporary).unwrap();
        assert_eq!(temp, std::env::temp_dir());

        if dirs::home_dir().is_some() {
            assert!(get_scope_base_directory(StoreScope::Local)
                .unwrap()
                .is_absolute());
            assert!(get_scope_base_directory(StoreScope::Roaming)
                .unwrap()
                .is_absolute());
        }
    }

    #[test]
    fn test_application_names() {
        assert!(validate_application_name("isostore").is_ok());
        assert!(validate_application_name("com.example.app_2-beta").is_ok());

        assert!(validate_application_name("").is_err());
        assert!(validate_application_name("..").is_err());
        assert!(validate_application_name("a/b").is_err());
        assert!(validate_application_name("a\\b").is_err());
        assert!(validate_application_name("my app").is_err());
    }

    #[test]
    fn test_ensure_directory_exists() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("one").join("two");

        ensure_directory_exists(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_directory_exists(&nested).unwrap();

        let file = temp.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        assert!(ensure_directory_exists(&file).is_err());
    }

    #[test]
    fn test_lock_file_path() {
        let path = lock_file_path(Path::new("/base"), "app");
        assert_eq!(path, PathBuf::from("/base").join("app.lock"));
    }
}
