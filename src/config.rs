//! Service configuration
//!
//! Values come from an optional TOML file and are then overridden by
//! environment variables. Signing secrets have no defaults: the service
//! refuses to start without them.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Minimum accepted length for a JWT signing secret.
pub const MIN_SECRET_LEN: usize = 32;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Top-level service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// User store location. `memory` selects the in-process store.
    pub database_url: String,

    /// Allowed CORS origin (permissive when unset)
    pub cors_origin: Option<String>,

    /// Where uploaded multipart files are staged before hand-off to the media host
    pub upload_dir: PathBuf,

    /// Request body limit in bytes
    pub body_limit_bytes: usize,

    /// Token and password settings
    pub auth: AuthConfig,

    /// Media host settings
    pub media: MediaConfig,
}

/// Token and password settings
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Secret used to sign access tokens
    pub access_token_secret: String,

    /// Access token lifetime, e.g. `15m` or `1d`
    pub access_token_expiry: String,

    /// Secret used to sign refresh tokens (must differ from the access secret)
    pub refresh_token_secret: String,

    /// Refresh token lifetime, e.g. `10d`
    pub refresh_token_expiry: String,

    /// bcrypt work factor
    pub bcrypt_cost: u32,

    /// Mark session cookies `Secure`
    pub secure_cookies: bool,
}

/// Cloudinary media host settings
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_url: "sqlite://./users.db".to_string(),
            cors_origin: None,
            upload_dir: PathBuf::from("./public/temp"),
            body_limit_bytes: 16 * 1024 * 1024,
            auth: AuthConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: String::new(),
            access_token_expiry: "1d".to_string(),
            refresh_token_secret: String::new(),
            refresh_token_expiry: "10d".to_string(),
            bcrypt_cost: 10,
            secure_cookies: true,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            cloud_name: None,
            api_key: None,
            api_secret: None,
            base_url: "https://api.cloudinary.com".to_string(),
            timeout_secs: 30,
        }
    }
}

// Secrets must never reach the logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_secret", &"<redacted>")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_secret", &"<redacted>")
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}

impl fmt::Debug for MediaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration: TOML file (explicit path, else `CONFIG_PATH`),
    /// environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env_var("CONFIG_PATH").map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without applying environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Override values from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_var("HOST") {
            self.host = v;
        }
        if let Some(v) = env_parse("PORT")? {
            self.port = v;
        }
        if let Some(v) = env_var("DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = env_var("CORS_ORIGIN") {
            self.cors_origin = Some(v);
        }
        if let Some(v) = env_var("UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = env_parse("BODY_LIMIT_BYTES")? {
            self.body_limit_bytes = v;
        }

        let auth = &mut self.auth;
        if let Some(v) = env_var("ACCESS_TOKEN_SECRET") {
            auth.access_token_secret = v;
        }
        if let Some(v) = env_var("ACCESS_TOKEN_EXPIRY") {
            auth.access_token_expiry = v;
        }
        if let Some(v) = env_var("REFRESH_TOKEN_SECRET") {
            auth.refresh_token_secret = v;
        }
        if let Some(v) = env_var("REFRESH_TOKEN_EXPIRY") {
            auth.refresh_token_expiry = v;
        }
        if let Some(v) = env_parse("BCRYPT_COST")? {
            auth.bcrypt_cost = v;
        }
        if let Some(v) = env_parse("SECURE_COOKIES")? {
            auth.secure_cookies = v;
        }

        let media = &mut self.media;
        if let Some(v) = env_var("CLOUDINARY_CLOUD_NAME") {
            media.cloud_name = Some(v);
        }
        if let Some(v) = env_var("CLOUDINARY_API_KEY") {
            media.api_key = Some(v);
        }
        if let Some(v) = env_var("CLOUDINARY_API_SECRET") {
            media.api_secret = Some(v);
        }
        if let Some(v) = env_var("CLOUDINARY_BASE_URL") {
            media.base_url = v;
        }
        if let Some(v) = env_parse("CLOUDINARY_TIMEOUT_SECS")? {
            media.timeout_secs = v;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth.validate()?;
        self.media.validate()?;

        if self.body_limit_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "body_limit_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// `host:port` bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.eq_ignore_ascii_case("memory")
    }
}

impl AuthConfig {
    /// Access token lifetime in seconds
    pub fn access_ttl_secs(&self) -> Result<u64, ConfigError> {
        parse_expiry("access_token_expiry", &self.access_token_expiry)
    }

    /// Refresh token lifetime in seconds
    pub fn refresh_ttl_secs(&self) -> Result<u64, ConfigError> {
        parse_expiry("refresh_token_expiry", &self.refresh_token_expiry)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_secret("access_token_secret", &self.access_token_secret)?;
        check_secret("refresh_token_secret", &self.refresh_token_secret)?;

        if self.access_token_secret == self.refresh_token_secret {
            return Err(ConfigError::Invalid {
                key: "refresh_token_secret",
                reason: "must differ from access_token_secret".to_string(),
            });
        }

        self.access_ttl_secs()?;
        self.refresh_ttl_secs()?;

        // bcrypt accepts 4..=31
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "bcrypt_cost",
                reason: format!("{} is outside 4..=31", self.bcrypt_cost),
            });
        }
        Ok(())
    }
}

impl MediaConfig {
    /// True when all Cloudinary credentials are present
    pub fn is_configured(&self) -> bool {
        self.cloud_name.is_some() && self.api_key.is_some() && self.api_secret.is_some()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let present = [&self.cloud_name, &self.api_key, &self.api_secret]
            .iter()
            .filter(|v| v.is_some())
            .count();

        if present != 0 && present != 3 {
            return Err(ConfigError::Invalid {
                key: "media",
                reason: "cloud_name, api_key and api_secret must be set together".to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "media.timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Parse a lifetime such as `3600`, `90s`, `15m`, `12h` or `10d` into seconds.
pub fn parse_expiry(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    let value = value.trim();
    let invalid = |reason: &str| ConfigError::Invalid {
        key,
        reason: format!("{reason}: {value:?}"),
    };

    let (digits, multiplier) = match value.char_indices().last() {
        Some((idx, 's')) => (&value[..idx], 1),
        Some((idx, 'm')) => (&value[..idx], 60),
        Some((idx, 'h')) => (&value[..idx], 60 * 60),
        Some((idx, 'd')) => (&value[..idx], 24 * 60 * 60),
        Some(_) => (value, 1),
        None => return Err(invalid("empty duration")),
    };

    let amount: u64 = digits
        .trim()
        .parse()
        .map_err(|_| invalid("expected a number with optional s/m/h/d suffix"))?;

    if amount == 0 {
        return Err(invalid("duration must be greater than zero"));
    }

    let secs = amount
        .checked_mul(multiplier)
        .ok_or_else(|| invalid("duration overflows"))?;
    // Token expiry is a signed unix timestamp.
    if i64::try_from(secs).is_err() {
        return Err(invalid("duration overflows"));
    }
    Ok(secs)
}

fn check_secret(key: &'static str, secret: &str) -> Result<(), ConfigError> {
    if secret.is_empty() {
        return Err(ConfigError::Missing(key));
    }
    if secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("must be at least {MIN_SECRET_LEN} characters"),
        });
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key: name,
                reason: format!("cannot parse {raw:?}"),
            }),
        None => Ok(None),
    }
}
