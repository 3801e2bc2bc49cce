//! Sandbox configuration
//!
//! Decides where a [`PersistenceManager`](crate::core::PersistenceManager)
//! puts its store and how it guards it. Configuration is plain data and can
//! be embedded in a host's own YAML settings or loaded from a file.
//!
//! ```yaml
//! application: my-engine
//! scope: roaming
//! exclusive: true
//! lock_timeout_secs: 5
//! ```

pub mod paths;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which per-user location a sandbox lives under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreScope {
    /// Machine-local user data
    #[default]
    Local,
    /// User data that may follow the user between machines
    Roaming,
    /// System temp directory
    Temporary,
}

/// Configuration for a sandboxed store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Sandbox name, used as the root directory name
    pub application: String,

    /// Base location for the sandbox
    pub scope: StoreScope,

    /// Explicit base directory, overriding `scope`
    pub base_directory: Option<PathBuf>,

    /// Hold an exclusive lock on the sandbox while the handle is live
    pub exclusive: bool,

    /// How long to wait for the exclusive lock, in seconds
    pub lock_timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            application: "isostore".to_string(),
            scope: StoreScope::Local,
            base_directory: None,
            exclusive: false,
            lock_timeout_secs: 5,
        }
    }
}

impl SandboxConfig {
    /// Configuration for a named application with default settings
    pub fn for_application<S: Into<String>>(application: S) -> Self {
        Self {
            application: application.into(),
            ..Self::default()
        }
    }

    pub fn with_scope(mut self, scope: StoreScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_base_directory<P: Into<PathBuf>>(mut self, base: P) -> Self {
        self.base_directory = Some(base.into());
        self
    }

    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Parse configuration from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).context("Failed to parse sandbox configuration YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read sandbox configuration: {path:?}"))?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        paths::validate_application_name(&self.application)
    }

    /// Directory the sandbox root is created in
    pub fn base_directory(&self) -> Result<PathBuf> {
        match &self.base_directory {
            Some(base) => Ok(base.clone()),
            None => paths::get_scope_base_directory(self.scope),
        }
    }

    /// Host directory acting as sandbox root
    pub fn resolve_root(&self) -> Result<PathBuf> {
        self.validate()?;
        Ok(self.base_directory()?.join(&self.application))
    }

    /// Host path of the exclusive lock file
    pub fn resolve_lock_path(&self) -> Result<PathBuf> {
        self.validate()?;
        Ok(paths::lock_file_path(
            &self.base_directory()?,
            &self.application,
        ))
    }
}
