//! corkboard/crates/storage-adapters/src/lib.rs
//!
//! Concrete `StorageDriver` and `KeyValueStore` backends, plus the
//! `DriverManager` that picks between them.

pub mod filesystem;
pub mod manager;
pub mod memory;
#[cfg(feature = "remote-http")]
pub mod remote;
#[cfg(feature = "db-sqlite")]
pub mod sqlite;

pub use filesystem::FilesystemDriver;
pub use manager::{DriverManager, DriverStatus, NamedDriver};
pub use memory::{MemoryDriver, MemoryKeyValueStore};
#[cfg(feature = "remote-http")]
pub use remote::RemoteDriver;
#[cfg(feature = "db-sqlite")]
pub use sqlite::{SqliteDriver, SqliteKeyValueStore};
