//! Token and password primitives

pub mod password_service;
pub mod token_service;

pub use password_service::PasswordService;
pub use token_service::{tokens_match, AccessClaims, RefreshClaims, TokenService};
