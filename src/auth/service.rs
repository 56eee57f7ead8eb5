//! Account session manager
//!
//! Owns every account operation: registration, login and logout, refresh
//! token rotation, password change, and profile and image updates. The
//! user store and the media host are injected as trait objects.

use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{
    core::{tokens_match, PasswordService, TokenService},
    errors::SessionError,
    media::{MediaBlob, MediaHost},
    storage::UserStore,
    types::*,
};
use crate::config::AuthConfig;

/// Which profile image an operation replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageKind {
    Avatar,
    CoverImage,
}

impl ImageKind {
    fn label(self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::CoverImage => "cover image",
        }
    }

    fn current(self, user: &User) -> Option<&str> {
        match self {
            Self::Avatar => Some(user.avatar.as_str()).filter(|url| !url.is_empty()),
            Self::CoverImage => user.cover_image.as_deref().filter(|url| !url.is_empty()),
        }
    }

    fn update(self, url: String) -> UserUpdate {
        match self {
            Self::Avatar => UserUpdate {
                avatar: Some(url),
                ..UserUpdate::default()
            },
            Self::CoverImage => UserUpdate {
                cover_image: Some(url),
                ..UserUpdate::default()
            },
        }
    }
}

/// Account session manager
pub struct SessionManager {
    store: Arc<dyn UserStore>,
    media: Arc<dyn MediaHost>,
    tokens: TokenService,
    passwords: PasswordService,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn UserStore>,
        media: Arc<dyn MediaHost>,
        tokens: TokenService,
        passwords: PasswordService,
    ) -> Self {
        Self {
            store,
            media,
            tokens,
            passwords,
        }
    }

    /// Build the token and password services from configuration
    ///
    /// # Errors
    /// Returns `SessionError::Internal` if the token settings are unusable
    pub fn from_config(
        config: &AuthConfig,
        store: Arc<dyn UserStore>,
        media: Arc<dyn MediaHost>,
    ) -> Result<Self, SessionError> {
        Ok(Self::new(
            store,
            media,
            TokenService::from_config(config)?,
            PasswordService::from_config(config),
        ))
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Name of the configured media host
    pub fn media_host(&self) -> &str {
        self.media.name()
    }

    /// Create an account. The avatar is mandatory, the cover image optional.
    pub async fn register(&self, registration: Registration) -> Result<UserProfile, SessionError> {
        let full_name = required("fullName", registration.full_name.as_deref())?;
        let email = required("email", registration.email.as_deref())?;
        let username = required("username", registration.username.as_deref())?;
        let password = required_secret("password", registration.password.as_deref())?;

        let username = normalize_identifier(username);
        let email = normalize_identifier(email);
        info!("registering user: username={}", username);

        if self
            .store
            .find_by_username_or_email(Some(&username), Some(&email))
            .await?
            .is_some()
        {
            return Err(SessionError::Conflict(
                "user with email or username already exists".to_string(),
            ));
        }

        let avatar_blob = registration
            .avatar
            .as_ref()
            .ok_or_else(|| SessionError::Validation("avatar file is required".to_string()))?;

        let password_hash = self.passwords.hash_password(password)?;

        let avatar = self
            .upload(avatar_blob, "avatar")
            .await
            .ok_or_else(|| SessionError::Upload("avatar upload failed".to_string()))?;

        let cover_image = match &registration.cover_image {
            Some(blob) => self.upload(blob, "cover image").await,
            None => None,
        };

        let created = self
            .store
            .create(NewUser {
                username,
                email,
                full_name: full_name.to_string(),
                password_hash,
                avatar: avatar.clone(),
                cover_image: cover_image.clone(),
            })
            .await;

        let created = match created {
            Ok(user) => user,
            Err(e) => {
                self.discard(&avatar).await;
                if let Some(cover) = &cover_image {
                    self.discard(cover).await;
                }
                return Err(e);
            }
        };

        let user = self.store.find_by_id(&created.id).await?.ok_or_else(|| {
            SessionError::Internal(format!("user {} missing right after creation", created.id))
        })?;

        info!("user registered: id={}, username={}", user.id, user.username);
        Ok(user.profile())
    }

    /// Verify credentials and open a session
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginSession, SessionError> {
        let username = non_blank(request.username.as_deref()).map(normalize_identifier);
        let email = non_blank(request.email.as_deref()).map(normalize_identifier);

        if username.is_none() && email.is_none() {
            return Err(SessionError::Validation(
                "username or email is required".to_string(),
            ));
        }

        let user = self
            .store
            .find_by_username_or_email(username.as_deref(), email.as_deref())
            .await?
            .ok_or_else(|| SessionError::NotFound("user does not exist".to_string()))?;

        if !self
            .passwords
            .verify_password(&request.password, &user.password)?
        {
            warn!("login rejected: user_id={}", user.id);
            return Err(SessionError::Auth("invalid user credentials".to_string()));
        }

        let tokens = self.issue_session(&user).await?;
        info!("user logged in: id={}", user.id);

        Ok(LoginSession::new(user.profile(), tokens))
    }

    /// Drop the stored refresh token. A user that no longer exists is not an error.
    pub async fn logout(&self, user_id: &str) -> Result<(), SessionError> {
        let updated = self
            .store
            .update(
                user_id,
                UserUpdate::clear_refresh_token(),
                SaveOptions::skip_validation(),
            )
            .await?;

        if updated.is_none() {
            warn!("logout for unknown user: id={}", user_id);
        } else {
            info!("user logged out: id={}", user_id);
        }
        Ok(())
    }

    /// Exchange the current refresh token for a new pair. The presented token
    /// must equal the single value stored on the user record.
    pub async fn refresh_session(
        &self,
        presented: Option<&str>,
    ) -> Result<TokenPair, SessionError> {
        let token = non_blank(presented)
            .ok_or_else(|| SessionError::Auth("unauthorized request".to_string()))?;

        let claims = self.tokens.verify_refresh_token(token)?;

        let user = self
            .store
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| SessionError::Auth("invalid refresh token".to_string()))?;

        let current = user.refresh_token.as_deref().unwrap_or_default();
        if current.is_empty() || !tokens_match(token, current) {
            warn!("stale refresh token presented: user_id={}", user.id);
            return Err(SessionError::Auth(
                "refresh token is expired or used".to_string(),
            ));
        }

        let tokens = self.issue_session(&user).await?;
        info!("session refreshed: user_id={}", user.id);
        Ok(tokens)
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), SessionError> {
        if new_password.trim().is_empty() {
            return Err(SessionError::Validation(
                "new password is required".to_string(),
            ));
        }

        let user = self.find_user(user_id).await?;

        if !self.passwords.verify_password(old_password, &user.password)? {
            warn!("password change rejected: user_id={}", user_id);
            return Err(SessionError::Auth("invalid old password".to_string()));
        }

        let hash = self.passwords.hash_password(new_password)?;
        self.store
            .update(
                user_id,
                UserUpdate::password_hash(hash),
                SaveOptions::skip_validation(),
            )
            .await?
            .ok_or_else(|| SessionError::NotFound("user not found".to_string()))?;

        info!("password changed: user_id={}", user_id);
        Ok(())
    }

    pub async fn current_user(&self, user_id: &str) -> Result<UserProfile, SessionError> {
        Ok(self.find_user(user_id).await?.profile())
    }

    /// Verify an access token and load its user
    pub async fn authenticate(&self, access_token: &str) -> Result<UserProfile, SessionError> {
        let claims = self.tokens.verify_access_token(access_token)?;

        match self.current_user(&claims.sub).await {
            Err(SessionError::NotFound(_)) => {
                Err(SessionError::Auth("invalid access token".to_string()))
            }
            other => other,
        }
    }

    /// Update display name and email
    pub async fn update_profile(
        &self,
        user_id: &str,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<UserProfile, SessionError> {
        let (Some(full_name), Some(email)) = (non_blank(full_name), non_blank(email)) else {
            return Err(SessionError::Validation(
                "fullName and email are required".to_string(),
            ));
        };

        let update = UserUpdate {
            full_name: Some(full_name.to_string()),
            email: Some(normalize_identifier(email)),
            ..UserUpdate::default()
        };

        let user = self
            .store
            .update(user_id, update, SaveOptions::default())
            .await?
            .ok_or_else(|| SessionError::NotFound("user not found".to_string()))?;

        info!("account details updated: user_id={}", user_id);
        Ok(user.profile())
    }

    pub async fn update_avatar(
        &self,
        user_id: &str,
        blob: Option<&MediaBlob>,
    ) -> Result<UserProfile, SessionError> {
        self.replace_image(user_id, blob, ImageKind::Avatar).await
    }

    pub async fn update_cover_image(
        &self,
        user_id: &str,
        blob: Option<&MediaBlob>,
    ) -> Result<UserProfile, SessionError> {
        self.replace_image(user_id, blob, ImageKind::CoverImage).await
    }

    // The old image goes first; its deletion never fails the operation.
    async fn replace_image(
        &self,
        user_id: &str,
        blob: Option<&MediaBlob>,
        kind: ImageKind,
    ) -> Result<UserProfile, SessionError> {
        let blob = blob
            .ok_or_else(|| SessionError::Validation(format!("{} file is missing", kind.label())))?;

        let user = self.find_user(user_id).await?;

        if let Some(old) = kind.current(&user) {
            self.discard(old).await;
        }

        let url = self.upload(blob, kind.label()).await.ok_or_else(|| {
            SessionError::Upload(format!("error while uploading {}", kind.label()))
        })?;

        let user = self
            .store
            .update(user_id, kind.update(url), SaveOptions::default())
            .await?
            .ok_or_else(|| SessionError::NotFound("user not found".to_string()))?;

        info!("{} replaced: user_id={}", kind.label(), user_id);
        Ok(user.profile())
    }

    async fn find_user(&self, user_id: &str) -> Result<User, SessionError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| SessionError::NotFound("user not found".to_string()))
    }

    /// Sign a new pair and store its refresh token, replacing the previous one
    async fn issue_session(&self, user: &User) -> Result<TokenPair, SessionError> {
        let pair = self
            .tokens
            .issue_pair(user)
            .map_err(|e| SessionError::Internal(format!("token issuance failed: {e}")))?;

        let saved = self
            .store
            .update(
                &user.id,
                UserUpdate::refresh_token(pair.refresh_token.clone()),
                SaveOptions::skip_validation(),
            )
            .await
            .map_err(|e| SessionError::Internal(format!("failed to store refresh token: {e}")))?;

        if saved.is_none() {
            return Err(SessionError::Internal(format!(
                "user {} disappeared while issuing tokens",
                user.id
            )));
        }

        Ok(pair)
    }

    async fn upload(&self, blob: &MediaBlob, label: &str) -> Option<String> {
        match self.media.upload(blob).await {
            Ok(uploaded) if !uploaded.url.is_empty() => Some(uploaded.url),
            Ok(_) => {
                warn!("{} upload to {} returned no url", label, self.media.name());
                None
            }
            Err(e) => {
                warn!("{} upload to {} failed: {}", label, self.media.name(), e);
                None
            }
        }
    }

    async fn discard(&self, url: &str) {
        if let Err(e) = self.media.destroy(url).await {
            warn!("failed to delete {} from {}: {}", url, self.media.name(), e);
        }
    }
}

fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, SessionError> {
    non_blank(value).ok_or_else(|| SessionError::Validation(format!("{field} is required")))
}

/// Like [`required`] but hands back the value untouched. Passwords are
/// hashed exactly as typed.
fn required_secret<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, SessionError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SessionError::Validation(format!("{field} is required")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{media::MemoryMediaHost, storage::MemoryUserStore};

    const ACCESS: &str = "access-secret-for-unit-tests-0123456789";
    const REFRESH: &str = "refresh-secret-for-unit-tests-0123456789";

    fn manager(media: MemoryMediaHost) -> SessionManager {
        SessionManager::new(
            Arc::new(MemoryUserStore::new()),
            Arc::new(media),
            TokenService::new(ACCESS.to_string(), 900, REFRESH.to_string(), 86_400).unwrap(),
            PasswordService::new(4),
        )
    }

    fn staged(dir: &tempfile::TempDir, name: &str) -> MediaBlob {
        let path = dir.path().join(uuid::Uuid::new_v4().to_string());
        std::fs::write(&path, b"image-bytes").unwrap();
        MediaBlob::new(path, name)
    }

    #[test]
    fn test_image_kind_update() {
        let update = ImageKind::CoverImage.update("u".to_string());
        assert_eq!(update.cover_image.as_deref(), Some("u"));
        assert!(update.avatar.is_none());
        assert_eq!(ImageKind::Avatar.label(), "avatar");
    }

    #[test]
    fn test_required_fields() {
        assert!(matches!(
            required("email", Some("  ")),
            Err(SessionError::Validation(msg)) if msg == "email is required"
        ));
        assert_eq!(required("email", Some(" a@b.c ")).unwrap(), "a@b.c");

        assert!(required_secret("password", Some(" \t ")).is_err());
        assert!(required_secret("password", None).is_err());
        assert_eq!(
            required_secret("password", Some(" pass word ")).unwrap(),
            " pass word "
        );
    }

    #[tokio::test]
    async fn test_register_conflict_is_caught_before_upload() {
        let dir = tempfile::tempdir().unwrap();
        let media = MemoryMediaHost::new();
        let manager = manager(media.clone());

        manager
            .register(Registration {
                full_name: Some("Jane Doe".to_string()),
                email: Some("jane@x.com".to_string()),
                username: Some("janedoe".to_string()),
                password: Some("secret1".to_string()),
                avatar: Some(staged(&dir, "a.png")),
                cover_image: None,
            })
            .await
            .unwrap();

        // Same email, different case: caught by the pre-check, nothing uploaded.
        let result = manager
            .register(Registration {
                full_name: Some("Jane Again".to_string()),
                email: Some("JANE@x.com".to_string()),
                username: Some("other".to_string()),
                password: Some("secret1".to_string()),
                avatar: Some(staged(&dir, "b.png")),
                cover_image: None,
            })
            .await;
        assert!(matches!(result, Err(SessionError::Conflict(_))));
        assert_eq!(media.uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_cover_upload_failure_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let media = MemoryMediaHost::new();
        let manager = manager(media.clone());

        // A cover image pointing at a missing file fails to upload.
        let profile = manager
            .register(Registration {
                full_name: Some("Jane Doe".to_string()),
                email: Some("jane@x.com".to_string()),
                username: Some("janedoe".to_string()),
                password: Some("secret1".to_string()),
                avatar: Some(staged(&dir, "a.png")),
                cover_image: Some(MediaBlob::new(dir.path().join("gone"), "c.png")),
            })
            .await
            .unwrap();

        assert!(profile.cover_image.is_none());
        assert!(!profile.avatar.is_empty());
    }
}
