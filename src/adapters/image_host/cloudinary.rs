use crate::adapters::image_host::{ImageHost, ImageHostError, ImageSource, extension_for};
use crate::config::SignatureAlgorithm;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Signed uploads to Cloudinary's image endpoint.
///
/// Requests are signed with SHA-1 unless the account is configured for SHA-256.
#[derive(Clone, Debug)]
pub struct CloudinaryImageHost {
    client: reqwest::Client,
    upload_url: String,
    ping_url: String,
    api_key: String,
    api_secret: String,
    algorithm: SignatureAlgorithm,
}

impl CloudinaryImageHost {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_base: &str,
        cloud_name: &str,
        api_key: String,
        api_secret: String,
        algorithm: SignatureAlgorithm,
    ) -> Self {
        let base = format!("{}/v1_1/{cloud_name}", api_base.trim_end_matches('/'));
        Self {
            client,
            upload_url: format!("{base}/image/upload"),
            ping_url: format!("{base}/ping"),
            api_key,
            api_secret,
            algorithm,
        }
    }

    /// Hex digest of `k=v` pairs sorted by key, joined with `&`, followed by the API secret.
    fn sign(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<_> = params.iter().collect();
        sorted.sort_by_key(|(key, _)| *key);
        let joined = sorted.iter().map(|(key, value)| format!("{key}={value}")).collect::<Vec<_>>().join("&");
        let payload = format!("{joined}{}", self.api_secret);

        match self.algorithm {
            SignatureAlgorithm::Sha1 => hex::encode(Sha1::digest(payload.as_bytes())),
            SignatureAlgorithm::Sha256 => hex::encode(Sha256::digest(payload.as_bytes())),
        }
    }
}

#[async_trait]
impl ImageHost for CloudinaryImageHost {
    #[tracing::instrument(level = "debug", skip(self, source), fields(media_type = %source.media_type()))]
    async fn upload(&self, source: ImageSource) -> Result<String, ImageHostError> {
        let (bytes, media_type) = source.into_bytes().await?;
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();

        let part = Part::bytes(bytes.to_vec())
            .file_name(format!("upload.{}", extension_for(&media_type)))
            .mime_str(&media_type)
            .map_err(|e| ImageHostError::InvalidPayload(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature", self.sign(&[("timestamp", timestamp.to_string())]));

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ImageHostError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageHostError::Rejected(format!("{status}: {body}")));
        }

        let uploaded: UploadResponse =
            response.json().await.map_err(|e| ImageHostError::Transport(format!("unreadable response: {e}")))?;
        Ok(uploaded.secure_url)
    }

    /// Admin API ping; also proves the key pair is accepted.
    async fn check(&self) -> Result<(), ImageHostError> {
        let response = self
            .client
            .get(&self.ping_url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .send()
            .await
            .map_err(|e| ImageHostError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() { Ok(()) } else { Err(ImageHostError::Rejected(format!("ping returned {status}"))) }
    }
}
