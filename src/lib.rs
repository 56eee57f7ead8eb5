//! Account session service: registration, login, refresh token rotation,
//! password and profile changes, avatar and cover image replacement.

pub mod auth;
pub mod config;
pub mod logging;
