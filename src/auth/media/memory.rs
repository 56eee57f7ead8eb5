//! In-memory media host
//!
//! Used when no Cloudinary credentials are configured, and by tests that
//! need to observe uploads and deletions or inject failures.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::r#trait::{MediaBlob, MediaError, MediaHost, UploadedMedia};

const DEFAULT_BASE_URL: &str = "https://media.local";

#[derive(Default)]
struct MemoryMediaState {
    next_version: u64,
    stored: HashSet<String>,
    uploads: Vec<UploadedMedia>,
    destroy_calls: Vec<String>,
    fail_uploads: bool,
    fail_destroys: bool,
}

/// Media host that keeps URLs in memory and never touches the network
#[derive(Clone)]
pub struct MemoryMediaHost {
    base_url: String,
    state: Arc<Mutex<MemoryMediaState>>,
}

impl Default for MemoryMediaHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMediaHost {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: Arc::new(Mutex::new(MemoryMediaState::default())),
        }
    }

    /// Make every following upload fail
    pub fn set_fail_uploads(&self, fail: bool) {
        self.state.lock().fail_uploads = fail;
    }

    /// Make every following destroy fail
    pub fn set_fail_destroys(&self, fail: bool) {
        self.state.lock().fail_destroys = fail;
    }

    /// Every successful upload so far, oldest first
    pub fn uploads(&self) -> Vec<UploadedMedia> {
        self.state.lock().uploads.clone()
    }

    /// URLs passed to `destroy`, including calls that failed
    pub fn destroy_calls(&self) -> Vec<String> {
        self.state.lock().destroy_calls.clone()
    }

    /// Whether the URL refers to a live object
    pub fn contains(&self, url: &str) -> bool {
        self.state.lock().stored.contains(url)
    }
}

#[async_trait]
impl MediaHost for MemoryMediaHost {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upload(&self, blob: &MediaBlob) -> Result<UploadedMedia, MediaError> {
        tokio::fs::metadata(&blob.path)
            .await
            .map_err(|source| MediaError::Io {
                path: blob.path.clone(),
                source,
            })?;

        let mut state = self.state.lock();
        if state.fail_uploads {
            return Err(MediaError::Unavailable("uploads disabled".to_string()));
        }

        state.next_version += 1;
        let public_id = uuid::Uuid::new_v4().simple().to_string();
        let file = match blob.extension() {
            Some(ext) => format!("{public_id}.{ext}"),
            None => public_id.clone(),
        };
        let url = format!(
            "{}/image/upload/v{}/{}",
            self.base_url, state.next_version, file
        );

        let uploaded = UploadedMedia { url, public_id };
        state.stored.insert(uploaded.url.clone());
        state.uploads.push(uploaded.clone());
        debug!("memory media upload: {}", uploaded.url);

        Ok(uploaded)
    }

    async fn destroy(&self, url: &str) -> Result<(), MediaError> {
        let mut state = self.state.lock();
        state.destroy_calls.push(url.to_string());

        if state.fail_destroys {
            return Err(MediaError::Unavailable("deletes disabled".to_string()));
        }
        if !url.starts_with(&self.base_url) {
            return Err(MediaError::UnrecognizedUrl(url.to_string()));
        }

        state.stored.remove(url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_and_destroy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged");
        std::fs::write(&path, b"png").unwrap();

        let host = MemoryMediaHost::new();
        let uploaded = host
            .upload(&MediaBlob::new(&path, "avatar.PNG"))
            .await
            .unwrap();
        assert!(uploaded.url.ends_with(".png"));
        assert!(host.contains(&uploaded.url));

        host.destroy(&uploaded.url).await.unwrap();
        assert!(!host.contains(&uploaded.url));
        assert_eq!(host.destroy_calls(), vec![uploaded.url]);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_io_error() {
        let host = MemoryMediaHost::new();
        let result = host
            .upload(&MediaBlob::new("/definitely/not/here", "a.png"))
            .await;
        assert!(matches!(result, Err(MediaError::Io { .. })));
        assert!(host.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged");
        std::fs::write(&path, b"png").unwrap();

        let host = MemoryMediaHost::new();
        host.set_fail_uploads(true);
        assert!(host.upload(&MediaBlob::new(&path, "a.png")).await.is_err());

        host.set_fail_destroys(true);
        assert!(host.destroy("https://media.local/x.png").await.is_err());
        assert_eq!(host.destroy_calls().len(), 1);
    }
}
