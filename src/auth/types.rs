//! Account and session types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::media::MediaBlob;

/// Stored user record. Holds secrets, so it is never serialized to clients;
/// use [`User::profile`] for anything leaving the service.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// User ID
    pub id: String,
    /// Unique, lowercase
    pub username: String,
    /// Unique, lowercase
    pub email: String,
    /// Display name
    pub full_name: String,
    /// Avatar URL on the media host
    pub avatar: String,
    /// Cover image URL on the media host
    pub cover_image: Option<String>,
    /// bcrypt hash
    pub password: String,
    /// The single refresh token currently accepted for this user
    pub refresh_token: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Client-facing view of a user: no password, no refresh token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub avatar: String,
    pub cover_image: Option<String>,
}

/// Partial update of a user record. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub password_hash: Option<String>,
    /// `Some(None)` clears the stored token
    pub refresh_token: Option<Option<String>>,
}

/// Save behaviour for [`UserUpdate`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Run required-field validation before persisting
    pub validate: bool,
}

/// Access/refresh token pair
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful login
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginSession {
    pub user: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
}

/// Registration input, after multipart parsing
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<MediaBlob>,
    pub cover_image: Option<MediaBlob>,
}

/// Login request. Either identifier may be used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

/// Refresh request body (the cookie takes precedence)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Change password request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Account details update request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.clone(),
            cover_image: self.cover_image.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Build a fresh record from creation input
    pub fn from_new(id: String, new_user: NewUser, now: DateTime<Utc>) -> Self {
        Self {
            id,
            username: new_user.username,
            email: new_user.email,
            full_name: new_user.full_name,
            avatar: new_user.avatar,
            cover_image: new_user.cover_image,
            password: new_user.password_hash,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: UserUpdate, now: DateTime<Utc>) {
        if let Some(full_name) = update.full_name {
            self.full_name = full_name;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(avatar) = update.avatar {
            self.avatar = avatar;
        }
        if let Some(cover_image) = update.cover_image {
            self.cover_image = Some(cover_image);
        }
        if let Some(hash) = update.password_hash {
            self.password = hash;
        }
        if let Some(token) = update.refresh_token {
            self.refresh_token = token;
        }
        self.updated_at = now;
    }

    /// First required field that is blank, if any
    pub fn missing_required_field(&self) -> Option<&'static str> {
        [
            ("username", &self.username),
            ("email", &self.email),
            ("fullName", &self.full_name),
            ("password", &self.password),
            ("avatar", &self.avatar),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

impl UserUpdate {
    pub fn refresh_token(token: String) -> Self {
        Self {
            refresh_token: Some(Some(token)),
            ..Self::default()
        }
    }

    pub fn clear_refresh_token() -> Self {
        Self {
            refresh_token: Some(None),
            ..Self::default()
        }
    }

    pub fn password_hash(hash: String) -> Self {
        Self {
            password_hash: Some(hash),
            ..Self::default()
        }
    }
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

impl SaveOptions {
    /// Persist without required-field validation
    pub fn skip_validation() -> Self {
        Self { validate: false }
    }
}

impl LoginSession {
    pub fn new(user: UserProfile, tokens: TokenPair) -> Self {
        Self {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }

    pub fn tokens(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

/// Lowercased, trimmed username or email
pub fn normalize_identifier(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Trimmed value, or `None` when missing or blank
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
