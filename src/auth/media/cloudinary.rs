//! Cloudinary media host
//!
//! Uses the signed upload API: every request carries `api_key`, a
//! `timestamp` and a SHA-256 signature over the sorted parameters plus the
//! API secret.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info};

use super::r#trait::{MediaBlob, MediaError, MediaHost, UploadedMedia};
use crate::config::MediaConfig;

/// Cloudinary client
pub struct CloudinaryHost {
    cloud_name: String,
    api_key: String,
    api_secret: zeroize::Zeroizing<String>,
    base_url: String,
    client: reqwest::Client,
}

/// Location of an asset on Cloudinary, derived from its delivery URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageId {
    /// `image`, `video` or `raw`
    pub resource_type: String,
    pub public_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl CloudinaryHost {
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: zeroize::Zeroizing::new(api_secret.into()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build a client when credentials are configured
    pub fn from_config(config: &MediaConfig) -> Result<Option<Self>, MediaError> {
        match (&config.cloud_name, &config.api_key, &config.api_secret) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Self::new(
                cloud_name.clone(),
                api_key.clone(),
                api_secret.clone(),
                config.base_url.clone(),
                Duration::from_secs(config.timeout_secs),
            )
            .map(Some),
            _ => Ok(None),
        }
    }

    fn endpoint(&self, resource_type: &str, action: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/{}",
            self.base_url, self.cloud_name, resource_type, action
        )
    }

    /// SHA-256 hex of `k1=v1&k2=v2...` (sorted by key) followed by the API secret
    pub fn sign(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<_> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn rejected(response: reqwest::Response) -> MediaError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error.message,
            Err(_) => "unexpected response".to_string(),
        };
        MediaError::Rejected { status, message }
    }
}

#[async_trait]
impl MediaHost for CloudinaryHost {
    fn name(&self) -> &str {
        "cloudinary"
    }

    async fn upload(&self, blob: &MediaBlob) -> Result<UploadedMedia, MediaError> {
        let bytes = tokio::fs::read(&blob.path)
            .await
            .map_err(|source| MediaError::Io {
                path: blob.path.clone(),
                source,
            })?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("timestamp", timestamp.clone())]);

        let mut file = Part::bytes(bytes).file_name(blob.file_name.clone());
        if let Some(content_type) = &blob.content_type {
            file = file.mime_str(content_type)?;
        }

        let form = Form::new()
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
            .part("file", file);

        let response = self
            .client
            .post(self.endpoint("auto", "upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }

        let body: UploadResponse = response.json().await?;
        let url = body
            .secure_url
            .or(body.url)
            .ok_or_else(|| MediaError::Rejected {
                status: 200,
                message: "upload response carried no url".to_string(),
            })?;

        info!("media uploaded: public_id={}", body.public_id);
        Ok(UploadedMedia {
            url,
            public_id: body.public_id,
        })
    }

    async fn destroy(&self, url: &str) -> Result<(), MediaError> {
        let id = storage_id_from_url(url)
            .ok_or_else(|| MediaError::UnrecognizedUrl(url.to_string()))?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("public_id", id.public_id.clone()),
            ("timestamp", timestamp.clone()),
        ]);

        let response = self
            .client
            .post(self.endpoint(&id.resource_type, "destroy"))
            .form(&[
                ("public_id", id.public_id.as_str()),
                ("api_key", self.api_key.as_str()),
                ("timestamp", timestamp.as_str()),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }

        let body: DestroyResponse = response.json().await?;
        match body.result.as_str() {
            "ok" => {
                info!("media destroyed: public_id={}", id.public_id);
                Ok(())
            }
            "not found" => {
                debug!("media already gone: public_id={}", id.public_id);
                Ok(())
            }
            other => Err(MediaError::Rejected {
                status: 200,
                message: format!("destroy returned {other:?}"),
            }),
        }
    }
}

/// Derive the storage id from a delivery URL such as
/// `https://res.cloudinary.com/<cloud>/image/upload/v1700000000/folder/name.jpg`.
///
/// The public id is every segment after `upload` except a leading version
/// segment, with the extension removed from the last one.
pub fn storage_id_from_url(url: &str) -> Option<StorageId> {
    let path = url.split(['?', '#']).next()?;
    let segments: Vec<&str> = path.split('/').collect();
    let upload_idx = segments.iter().position(|s| *s == "upload")?;

    let resource_type = segments.get(upload_idx.checked_sub(1)?)?.to_string();
    let mut rest = &segments[upload_idx + 1..];

    if let Some(first) = rest.first() {
        if is_version_segment(first) {
            rest = &rest[1..];
        }
    }

    let (last, folders) = rest.split_last()?;
    let file_stem = match last.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => last,
    };
    if file_stem.is_empty() || resource_type.is_empty() {
        return None;
    }

    let mut parts: Vec<&str> = folders.iter().copied().filter(|s| !s.is_empty()).collect();
    parts.push(file_stem);

    Some(StorageId {
        resource_type,
        public_id: parts.join("/"),
    })
}

fn is_version_segment(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_id_from_url() {
        let id = storage_id_from_url(
            "https://res.cloudinary.com/demo/image/upload/v1700000000/avatars/jane.png",
        )
        .unwrap();
        assert_eq!(id.resource_type, "image");
        assert_eq!(id.public_id, "avatars/jane");

        let id =
            storage_id_from_url("http://res.cloudinary.com/demo/video/upload/clip.mp4?x=1").unwrap();
        assert_eq!(id.resource_type, "video");
        assert_eq!(id.public_id, "clip");
    }

    #[test]
    fn test_storage_id_rejects_foreign_urls() {
        assert!(storage_id_from_url("https://example.com/images/a.png").is_none());
        assert!(storage_id_from_url("https://res.cloudinary.com/demo/image/upload/").is_none());
        assert!(storage_id_from_url("").is_none());
    }

    #[test]
    fn test_signature_is_order_independent() {
        let host = CloudinaryHost::new(
            "demo",
            "key",
            "secret",
            "https://api.cloudinary.com",
            Duration::from_secs(5),
        )
        .unwrap();

        let a = host.sign(&[("timestamp", "1".to_string()), ("public_id", "x".to_string())]);
        let b = host.sign(&[("public_id", "x".to_string()), ("timestamp", "1".to_string())]);
        assert_eq!(a, b);

        let expected = hex::encode(Sha256::digest(b"public_id=x&timestamp=1secret"));
        assert_eq!(a, expected);
    }
}
