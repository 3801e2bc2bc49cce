//! isostore
//!
//! A sandboxed persistence layer: file and directory primitives executed
//! against an isolated, per-application storage area instead of the general
//! filesystem. Storage engines program against [`PersistenceProvider`] and
//! stay independent of where the bytes actually live.
//!
//! # Features
//!
//! - **Directory sandbox**: [`PersistenceManager`] roots every path under a
//!   per-application directory and rejects paths that would leave it
//! - **In-memory sandbox**: [`MemoryPersistence`] implements the same contract
//!   for tests and hosts without a writable filesystem
//! - **Open modes**: six stream open modes with exact create/truncate rules
//! - **Deterministic lifecycle**: handles and streams are released on drop,
//!   and use after `dispose` fails fast
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::io::{Read, Write};
//! use isostore::{OpenMode, PersistenceManager, PersistenceProvider, SandboxConfig};
//!
//! # fn main() -> Result<(), isostore::PersistenceError> {
//! let config = SandboxConfig::for_application("my-engine");
//! let mut store = PersistenceManager::open(&config)?;
//!
//! store.create_directory("tables")?;
//! {
//!     let mut out = store.get_output_stream("tables/users.bin", OpenMode::Create)?;
//!     out.write_all(b"records").map_err(|e| isostore::PersistenceError::from_io("tables/users.bin", e))?;
//! }
//!
//! let mut contents = Vec::new();
//! store
//!     .get_input_stream("tables/users.bin")?
//!     .read_to_end(&mut contents)
//!     .map_err(|e| isostore::PersistenceError::from_io("tables/users.bin", e))?;
//! assert_eq!(store.get_file_length("tables/users.bin")?, contents.len() as u64);
//!
//! store.dispose();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod logging;

pub use crate::config::{SandboxConfig, StoreScope};
pub use crate::core::{
    ErrorKind, MemoryPersistence, MemoryStore, OpenMode, PersistenceError, PersistenceManager,
    PersistenceProvider, PersistenceResult,
};

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(VERSION.starts_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_providers_are_thread_safe() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PersistenceManager>();
        assert_send_sync::<MemoryPersistence>();
    }
}
