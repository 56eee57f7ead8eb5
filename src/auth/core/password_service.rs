//! Password hashing

use crate::auth::errors::SessionError;
use crate::config::AuthConfig;

/// bcrypt password hashing and verification
pub struct PasswordService {
    cost: u32,
}

impl PasswordService {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.bcrypt_cost)
    }

    pub fn hash_password(&self, password: &str) -> Result<String, SessionError> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| SessionError::Internal(format!("password hashing failed: {e}")))
    }

    /// Compare a candidate password with a stored hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, SessionError> {
        bcrypt::verify(password, hash)
            .map_err(|e| SessionError::Internal(format!("password verification failed: {e}")))
    }
}

impl Default for PasswordService {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let service = PasswordService::new(4);

        let hash = service.hash_password("secret1").unwrap();
        assert_ne!(hash, "secret1");

        assert!(service.verify_password("secret1", &hash).unwrap());
        assert!(!service.verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        let service = PasswordService::new(4);
        assert!(service.verify_password("secret1", "not-a-bcrypt-hash").is_err());
    }
}
