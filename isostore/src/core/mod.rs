//! Core persistence components
//!
//! - Provider contract shared by every sandbox backend
//! - Directory-backed manager and in-memory store
//! - Open modes, sandbox-relative paths, and error types

pub mod errors;
pub mod file_lock;
pub mod manager;
pub mod memory;
pub mod open_mode;
pub mod path;
pub mod provider;

// Re-export commonly used items
pub use errors::{ErrorKind, PersistenceError, PersistenceResult};
pub use file_lock::{FileLock, FileLockError};
pub use manager::PersistenceManager;
pub use memory::{MemoryInputStream, MemoryOutputStream, MemoryPersistence, MemoryStore};
pub use open_mode::OpenMode;
pub use path::SandboxPath;
pub use provider::PersistenceProvider;
