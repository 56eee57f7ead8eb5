//! Account authentication
//!
//! ```text
//! auth/
//! ├── types.rs          # user record, profile view, requests
//! ├── errors.rs         # SessionError and its HTTP mapping
//! ├── service.rs        # SessionManager: every account operation
//! ├── core/             # token signing, password hashing
//! ├── storage/          # UserStore trait, memory and SQLite backends
//! ├── media/            # MediaHost trait, Cloudinary and memory hosts
//! └── api/              # axum router, handlers, cookies
//! ```
//!
//! Dependencies flow one way: API → service → storage / media.

pub mod types;
pub mod errors;
pub mod service;
pub mod core;
pub mod storage;
pub mod media;
pub mod api;

pub use types::{LoginSession, TokenPair, User, UserProfile};
pub use errors::SessionError;
pub use service::SessionManager;
pub use api::{create_router, AppState};
pub use storage::{MemoryUserStore, SqliteUserStore, UserStore};
pub use media::{CloudinaryHost, MediaHost, MemoryMediaHost};
