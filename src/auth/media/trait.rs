//! Media host trait

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// A file staged on local disk, waiting to be handed to the media host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    /// Local path of the staged file
    pub path: PathBuf,
    /// Original file name as sent by the client
    pub file_name: String,
    /// Declared MIME type
    pub content_type: Option<String>,
}

/// Reference returned by a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    /// Retrievable URL
    pub url: String,
    /// Host-side storage id
    pub public_id: String,
}

/// Media host errors
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("media host request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("media host rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("cannot derive a storage id from {0}")]
    UnrecognizedUrl(String),

    #[error("media host unavailable: {0}")]
    Unavailable(String),
}

/// Third-party image storage
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Host name for logs
    fn name(&self) -> &str;

    /// Store the blob and return its URL and storage id
    async fn upload(&self, blob: &MediaBlob) -> Result<UploadedMedia, MediaError>;

    /// Delete the object behind a URL previously returned by [`MediaHost::upload`]
    async fn destroy(&self, url: &str) -> Result<(), MediaError>;
}

impl MediaBlob {
    pub fn new(path: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_name: file_name.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Lowercase extension of the original file name
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(str::to_ascii_lowercase)
    }
}
