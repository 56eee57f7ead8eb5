//! User store trait

use async_trait::async_trait;

use crate::auth::{
    errors::SessionError,
    types::{NewUser, SaveOptions, User, UserUpdate},
};

/// Persistence for user records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user whose username or email matches. Absent identifiers are ignored.
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, SessionError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, SessionError>;

    /// Insert a new user.
    ///
    /// # Errors
    /// `Conflict` when the username or email is taken, `Validation` when a
    /// required field is blank.
    async fn create(&self, new_user: NewUser) -> Result<User, SessionError>;

    /// Apply `update` to the user with `id`. Returns `None` if there is no such user.
    async fn update(
        &self,
        id: &str,
        update: UserUpdate,
        options: SaveOptions,
    ) -> Result<Option<User>, SessionError>;
}

/// Shared required-field check for store implementations
pub(crate) fn validate_record(user: &User) -> Result<(), SessionError> {
    match user.missing_required_field() {
        Some(field) => Err(SessionError::Validation(format!("{field} is required"))),
        None => Ok(()),
    }
}
