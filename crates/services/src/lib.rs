//! corkboard/crates/services/src/lib.rs
//!
//! The engine and everything it coordinates: undo history, backups, plugin
//! hooks, the sync queue and the event channel.

pub mod backup;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod plugin;

mod hooks;
mod transaction;

// Re-exporting for easier access in other crates
pub use backup::{BackupData, BackupError, BackupManager, BackupMetadata};
pub use engine::{Engine, EngineConfig};
pub use error::{CoreError, Result};
pub use events::{CoreErrorKind, CoreEvent, SyncEvent};
pub use history::{HistoryEntry, HistoryManager};
pub use plugin::{suggest_tags, Plugin, TagSuggester};
