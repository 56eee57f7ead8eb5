//! Access and refresh token signing

use crate::auth::{errors::SessionError, types::{TokenPair, User}};
use crate::config::{AuthConfig, MIN_SECRET_LEN};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;
use uuid::Uuid;

/// Access token claims: identity plus display fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User ID
    pub sub: String,
    pub email: String,
    pub username: String,
    pub full_name: String,
    /// Unique token id
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Refresh token claims: identity only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// User ID
    pub sub: String,
    /// Unique token id, so two tokens issued in the same second differ
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies access and refresh tokens with separate secrets
pub struct TokenService {
    access_secret: zeroize::Zeroizing<String>,
    access_ttl: u64,
    refresh_secret: zeroize::Zeroizing<String>,
    refresh_ttl: u64,
}

impl TokenService {
    /// Create a token service.
    ///
    /// # Errors
    /// Rejects secrets shorter than [`MIN_SECRET_LEN`], identical secrets,
    /// zero lifetimes and lifetimes that do not fit a signed timestamp.
    pub fn new(
        access_secret: String,
        access_ttl: u64,
        refresh_secret: String,
        refresh_ttl: u64,
    ) -> Result<Self, SessionError> {
        if access_secret.len() < MIN_SECRET_LEN || refresh_secret.len() < MIN_SECRET_LEN {
            return Err(SessionError::Internal(format!(
                "token secrets must be at least {MIN_SECRET_LEN} characters"
            )));
        }
        if access_secret == refresh_secret {
            return Err(SessionError::Internal(
                "access and refresh token secrets must differ".to_string(),
            ));
        }
        if access_ttl == 0 || refresh_ttl == 0 {
            return Err(SessionError::Internal(
                "token lifetimes must be greater than zero".to_string(),
            ));
        }
        if i64::try_from(access_ttl).is_err() || i64::try_from(refresh_ttl).is_err() {
            return Err(SessionError::Internal(
                "token lifetimes must fit in a signed 64-bit timestamp".to_string(),
            ));
        }

        Ok(Self {
            access_secret: zeroize::Zeroizing::new(access_secret),
            access_ttl,
            refresh_secret: zeroize::Zeroizing::new(refresh_secret),
            refresh_ttl,
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, SessionError> {
        let access_ttl = config
            .access_ttl_secs()
            .map_err(|e| SessionError::Internal(e.to_string()))?;
        let refresh_ttl = config
            .refresh_ttl_secs()
            .map_err(|e| SessionError::Internal(e.to_string()))?;

        Self::new(
            config.access_token_secret.clone(),
            access_ttl,
            config.refresh_token_secret.clone(),
            refresh_ttl,
        )
    }

    /// Access token lifetime in seconds
    pub fn access_ttl(&self) -> u64 {
        self.access_ttl
    }

    /// Refresh token lifetime in seconds
    pub fn refresh_ttl(&self) -> u64 {
        self.refresh_ttl
    }

    pub fn issue_access_token(&self, user: &User) -> Result<String, SessionError> {
        let now = chrono::Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: expires_at(now, self.access_ttl)?,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.access_secret.as_bytes()),
        )
        .map_err(|e| SessionError::Internal(format!("failed to sign access token: {e}")))
    }

    pub fn issue_refresh_token(&self, user: &User) -> Result<String, SessionError> {
        let now = chrono::Utc::now().timestamp();
        let claims = RefreshClaims {
            sub: user.id.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: expires_at(now, self.refresh_ttl)?,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.refresh_secret.as_bytes()),
        )
        .map_err(|e| SessionError::Internal(format!("failed to sign refresh token: {e}")))
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, SessionError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user)?,
            refresh_token: self.issue_refresh_token(user)?,
        })
    }

    /// Check signature and expiry of an access token
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, SessionError> {
        decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.access_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| rejection("access", e.kind()))
    }

    /// Check signature and expiry of a refresh token
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, SessionError> {
        decode::<RefreshClaims>(
            token,
            &DecodingKey::from_secret(self.refresh_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| rejection("refresh", e.kind()))
    }
}

fn rejection(kind: &str, error: &ErrorKind) -> SessionError {
    debug!("{} token rejected: {:?}", kind, error);
    match error {
        ErrorKind::ExpiredSignature => SessionError::Auth(format!("{kind} token expired")),
        _ => SessionError::Auth(format!("invalid {kind} token")),
    }
}

/// Constant-time comparison of a presented token with the stored one
pub fn tokens_match(presented: &str, stored: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(stored.as_bytes());
    a.ct_eq(&b).into()
}

fn expires_at(now: i64, ttl: u64) -> Result<i64, SessionError> {
    i64::try_from(ttl)
        .ok()
        .and_then(|ttl| now.checked_add(ttl))
        .ok_or_else(|| SessionError::Internal(format!("token lifetime {ttl}s overflows")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::NewUser;

    const ACCESS: &str = "access-secret-for-unit-tests-0123456789";
    const REFRESH: &str = "refresh-secret-for-unit-tests-0123456789";

    fn service() -> TokenService {
        TokenService::new(ACCESS.to_string(), 900, REFRESH.to_string(), 86_400)
            .expect("valid secrets")
    }

    fn user() -> User {
        User::from_new(
            "user-123".to_string(),
            NewUser {
                username: "janedoe".to_string(),
                email: "jane@x.com".to_string(),
                full_name: "Jane Doe".to_string(),
                password_hash: "hash".to_string(),
                avatar: "https://media.test/a.png".to_string(),
                cover_image: None,
            },
            chrono::Utc::now(),
        )
    }

    #[test]
    fn test_rejects_weak_or_shared_secrets() {
        assert!(TokenService::new("short".into(), 900, REFRESH.into(), 900).is_err());
        assert!(TokenService::new(ACCESS.into(), 900, ACCESS.into(), 900).is_err());
        assert!(TokenService::new(ACCESS.into(), 0, REFRESH.into(), 900).is_err());
        assert!(TokenService::new(ACCESS.into(), 900, REFRESH.into(), u64::MAX).is_err());
    }

    #[test]
    fn test_oversized_lifetime_fails_instead_of_overflowing() {
        let service =
            TokenService::new(ACCESS.into(), u64::MAX / 2, REFRESH.into(), u64::MAX / 2)
                .unwrap();

        assert!(matches!(
            service.issue_access_token(&user()),
            Err(SessionError::Internal(_))
        ));
        assert!(matches!(
            service.issue_refresh_token(&user()),
            Err(SessionError::Internal(_))
        ));
    }

    #[test]
    fn test_pair_decodes_to_same_identity() {
        let service = service();
        let pair = service.issue_pair(&user()).unwrap();

        let access = service.verify_access_token(&pair.access_token).unwrap();
        let refresh = service.verify_refresh_token(&pair.refresh_token).unwrap();
        assert_eq!(access.sub, "user-123");
        assert_eq!(refresh.sub, "user-123");
        assert_eq!(access.username, "janedoe");
    }

    #[test]
    fn test_secrets_are_not_interchangeable() {
        let service = service();
        let pair = service.issue_pair(&user()).unwrap();

        assert!(service.verify_access_token(&pair.refresh_token).is_err());
        assert!(service.verify_refresh_token(&pair.access_token).is_err());
        assert!(service.verify_refresh_token("not-a-jwt").is_err());
    }

    #[test]
    fn test_consecutive_refresh_tokens_differ() {
        let service = service();
        let user = user();
        let first = service.issue_refresh_token(&user).unwrap();
        let second = service.issue_refresh_token(&user).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_expired_refresh_token() {
        let service = service();
        let now = chrono::Utc::now().timestamp();
        let claims = RefreshClaims {
            sub: "user-123".to_string(),
            jti: "jti".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(REFRESH.as_bytes()),
        )
        .unwrap();

        match service.verify_refresh_token(&token) {
            Err(SessionError::Auth(msg)) => assert!(msg.contains("expired")),
            other => panic!("expected expiry rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abc", "abd"));
        assert!(!tokens_match("abc", ""));
    }
}
