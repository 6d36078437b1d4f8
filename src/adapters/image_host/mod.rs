use async_trait::async_trait;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use bytes::Bytes;
use crate::domain::upload::{is_image, normalize_media_type};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod cloudinary;
pub mod s3;

pub use cloudinary::CloudinaryImageHost;
pub use s3::S3ImageHost;

/// Failure of a single remote upload. Recovered per file; never turned into an HTTP error.
#[derive(Debug, Error)]
pub enum ImageHostError {
    #[error("invalid image payload: {0}")]
    InvalidPayload(String),
    #[error("could not read staged file: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("image host rejected the upload: {0}")]
    Rejected(String),
    #[error("upload timed out after {0:?}")]
    Timeout(Duration),
}

/// Standard alphabet that accepts padded and unpadded input.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A file the intake already wrote to disk.
    File { path: PathBuf, media_type: String },
    /// Bytes decoded from a legacy base64 request field.
    Inline { bytes: Bytes, media_type: String },
}

impl ImageSource {
    /// Parses a legacy inline image: either `data:image/<x>;base64,<payload>` or bare base64.
    ///
    /// # Errors
    /// Returns `ImageHostError::InvalidPayload` for a non-image data URI or undecodable base64.
    pub fn from_data_uri(raw: &str) -> Result<Self, ImageHostError> {
        let raw = raw.trim();
        let (media_type, payload) = match raw.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| ImageHostError::InvalidPayload("data URI without payload".into()))?;
                let declared = header
                    .strip_suffix(";base64")
                    .ok_or_else(|| ImageHostError::InvalidPayload("data URI is not base64 encoded".into()))?;
                let media_type = normalize_media_type(declared);
                if !is_image(&media_type) {
                    return Err(ImageHostError::InvalidPayload(format!("{media_type} is not an image")));
                }
                (media_type, payload)
            }
            None => ("application/octet-stream".to_string(), raw),
        };

        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = LENIENT_BASE64
            .decode(compact)
            .map_err(|e| ImageHostError::InvalidPayload(format!("bad base64: {e}")))?;
        if bytes.is_empty() {
            return Err(ImageHostError::InvalidPayload("empty image".into()));
        }

        Ok(Self::Inline { bytes: Bytes::from(bytes), media_type })
    }

    #[must_use]
    pub fn media_type(&self) -> &str {
        match self {
            Self::File { media_type, .. } | Self::Inline { media_type, .. } => media_type,
        }
    }

    /// # Errors
    /// Returns `ImageHostError::Io` if a staged file cannot be read.
    pub async fn into_bytes(self) -> Result<(Bytes, String), ImageHostError> {
        match self {
            Self::File { path, media_type } => Ok((Bytes::from(tokio::fs::read(&path).await?), media_type)),
            Self::Inline { bytes, media_type } => Ok((bytes, media_type)),
        }
    }
}

#[must_use]
pub fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

/// External content host that turns image bytes into a stable public URL.
#[async_trait]
pub trait ImageHost: Send + Sync + std::fmt::Debug + 'static {
    async fn upload(&self, source: ImageSource) -> Result<String, ImageHostError>;

    /// Readiness check against the host.
    async fn check(&self) -> Result<(), ImageHostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_is_decoded() {
        let source = ImageSource::from_data_uri("data:image/png;base64,aGVsbG8=").expect("valid");
        assert_eq!(source, ImageSource::Inline { bytes: Bytes::from_static(b"hello"), media_type: "image/png".into() });
    }

    #[test]
    fn test_bare_base64_is_accepted() {
        let source = ImageSource::from_data_uri("aGVsbG8=").expect("valid");
        assert_eq!(source.media_type(), "application/octet-stream");
    }

    #[test]
    fn test_unpadded_and_wrapped_base64_is_accepted() {
        let hello = Bytes::from_static(b"hello");
        for raw in ["aGVsbG8", "data:image/png;base64,aGVsbG8", "aGVs\nbG8=", "data:image/png;base64,aGVs\r\nbG8="] {
            match ImageSource::from_data_uri(raw) {
                Ok(ImageSource::Inline { bytes, .. }) => assert_eq!(bytes, hello, "for {raw:?}"),
                other => panic!("expected inline image for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_data_uri_media_type_is_normalized() {
        let source = ImageSource::from_data_uri("data:IMAGE/PNG;base64,aGVsbG8=").expect("valid");
        assert_eq!(source.media_type(), "image/png");
    }

    #[test]
    fn test_invalid_data_uris_are_rejected() {
        for raw in ["data:text/plain;base64,aGVsbG8=", "data:image/png,hello", "data:image/png;base64", "!!!", ""] {
            assert!(
                matches!(ImageSource::from_data_uri(raw), Err(ImageHostError::InvalidPayload(_))),
                "expected rejection for {raw:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_file_source_reads_from_disk() {
        let path = std::env::temp_dir().join(format!("agora-image-{}.png", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"png-bytes").await.expect("write");

        let (bytes, media_type) =
            ImageSource::File { path: path.clone(), media_type: "image/png".into() }.into_bytes().await.expect("read");
        assert_eq!(bytes.as_ref(), b"png-bytes");
        assert_eq!(media_type, "image/png");

        tokio::fs::remove_file(&path).await.expect("cleanup");
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/gif"), "gif");
        assert_eq!(extension_for("application/octet-stream"), "bin");
    }
}
