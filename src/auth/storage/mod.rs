//! User storage
//!
//! Trait plus two backends: in-memory and SQLite.

pub mod r#trait;
pub mod memory;
pub mod sqlite;

pub use r#trait::UserStore;
pub use memory::MemoryUserStore;
pub use sqlite::SqliteUserStore;
