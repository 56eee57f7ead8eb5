//! In-memory user store (development and tests)

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::r#trait::{validate_record, UserStore};
use crate::auth::{
    errors::SessionError,
    types::{NewUser, SaveOptions, User, UserUpdate},
};

/// In-memory store keyed by user id
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, SessionError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| {
                username.is_some_and(|name| u.username == name)
                    || email.is_some_and(|mail| u.email == mail)
            })
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, SessionError> {
        let users = self.users.read().await;
        Ok(users.get(id).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, SessionError> {
        let user = User::from_new(Uuid::new_v4().to_string(), new_user, chrono::Utc::now());
        validate_record(&user)?;

        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(SessionError::Conflict(
                "user with email or username already exists".to_string(),
            ));
        }

        users.insert(user.id.clone(), user.clone());
        info!("user stored in memory: id={}, username={}", user.id, user.username);

        Ok(user)
    }

    async fn update(
        &self,
        id: &str,
        update: UserUpdate,
        options: SaveOptions,
    ) -> Result<Option<User>, SessionError> {
        let mut users = self.users.write().await;
        let Some(current) = users.get(id) else {
            return Ok(None);
        };

        let mut updated = current.clone();
        updated.apply(update, chrono::Utc::now());

        if updated.email != current.email
            && users.values().any(|u| u.id != id && u.email == updated.email)
        {
            return Err(SessionError::Conflict("email already in use".to_string()));
        }
        if options.validate {
            validate_record(&updated)?;
        }

        users.insert(id.to_string(), updated.clone());
        Ok(Some(updated))
    }
}
