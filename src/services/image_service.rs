use crate::adapters::image_host::{ImageHost, ImageHostError, ImageSource};
use crate::domain::upload::StagedFile;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug)]
struct Metrics {
    uploads_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("agora-server");
        Self {
            uploads_total: meter
                .u64_counter("agora_image_uploads_total")
                .with_description("Remote image upload attempts by outcome")
                .build(),
        }
    }
}

/// Result of one remote upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Uploaded(String),
    Failed(String),
}

impl ImageOutcome {
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Uploaded(url) => Some(url),
            Self::Failed(_) => None,
        }
    }
}

/// Best-effort front for the configured image host. Every failure stays inside the returned outcome.
#[derive(Clone, Debug)]
pub struct ImageService {
    host: Arc<dyn ImageHost>,
    timeout: Duration,
    metrics: Metrics,
}

impl ImageService {
    #[must_use]
    pub fn new(host: Arc<dyn ImageHost>, timeout: Duration) -> Self {
        Self { host, timeout, metrics: Metrics::new() }
    }

    async fn attempt(&self, source: ImageSource) -> ImageOutcome {
        let result = match tokio::time::timeout(self.timeout, self.host.upload(source)).await {
            Ok(result) => result,
            Err(_) => Err(ImageHostError::Timeout(self.timeout)),
        };

        match result {
            Ok(url) => {
                self.metrics.uploads_total.add(1, &[KeyValue::new("status", "success")]);
                ImageOutcome::Uploaded(url)
            }
            Err(e) => {
                self.metrics.uploads_total.add(1, &[KeyValue::new("status", "failure")]);
                ImageOutcome::Failed(e.to_string())
            }
        }
    }

    /// Uploads staged image files one after another, yielding one outcome per file in input order.
    #[tracing::instrument(skip(self, files), fields(count = files.len()))]
    pub async fn upload_files(&self, files: &[StagedFile]) -> Vec<ImageOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            let source = ImageSource::File { path: file.path.clone(), media_type: file.media_type.clone() };
            let outcome = self.attempt(source).await;
            if let ImageOutcome::Failed(reason) = &outcome {
                tracing::warn!(filename = %file.original_name, %reason, "Image upload failed; skipping file");
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Uploads a legacy base64 image field.
    #[tracing::instrument(skip(self, encoded), fields(len = encoded.len()))]
    pub async fn upload_inline(&self, encoded: &str) -> ImageOutcome {
        let outcome = match ImageSource::from_data_uri(encoded) {
            Ok(source) => self.attempt(source).await,
            Err(e) => {
                self.metrics.uploads_total.add(1, &[KeyValue::new("status", "invalid")]);
                ImageOutcome::Failed(e.to_string())
            }
        };
        if let ImageOutcome::Failed(reason) = &outcome {
            tracing::warn!(%reason, "Inline image upload failed");
        }
        outcome
    }
}

/// Picks the single image URL stored on the message.
///
/// A successful inline upload wins; otherwise the first successful multipart image is used.
/// Later successful multipart URLs are discarded.
#[must_use]
pub fn resolve_legacy_image(inline: Option<&ImageOutcome>, files: &[ImageOutcome]) -> Option<String> {
    inline
        .and_then(ImageOutcome::url)
        .or_else(|| files.iter().find_map(ImageOutcome::url))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails on every path containing "bad"; numbers successful uploads.
    #[derive(Debug, Default)]
    struct ScriptedHost {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageHost for ScriptedHost {
        async fn upload(&self, source: ImageSource) -> Result<String, ImageHostError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            match source {
                ImageSource::File { path, .. } if path.to_string_lossy().contains("bad") => {
                    Err(ImageHostError::Rejected("quota exceeded".into()))
                }
                ImageSource::File { .. } => Ok(format!("https://img.test/file-{n}")),
                ImageSource::Inline { .. } => Ok(format!("https://img.test/inline-{n}")),
            }
        }

        async fn check(&self) -> Result<(), ImageHostError> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct SlowHost;

    #[async_trait]
    impl ImageHost for SlowHost {
        async fn upload(&self, _source: ImageSource) -> Result<String, ImageHostError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("https://never".into())
        }

        async fn check(&self) -> Result<(), ImageHostError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    fn staged(name: &str) -> StagedFile {
        StagedFile {
            original_name: name.to_string(),
            stored_name: format!("1-{name}"),
            path: PathBuf::from("/tmp").join(name),
            media_type: "image/png".into(),
            size_bytes: 4,
        }
    }

    fn service(host: impl ImageHost) -> ImageService {
        ImageService::new(Arc::new(host), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_single_failure_does_not_abort_the_batch() {
        let service = service(ScriptedHost::default());
        let outcomes = service.upload_files(&[staged("a.png"), staged("bad.png"), staged("c.png")]).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0], ImageOutcome::Uploaded("https://img.test/file-0".into()));
        assert!(matches!(&outcomes[1], ImageOutcome::Failed(reason) if reason.contains("quota")));
        assert_eq!(outcomes[2], ImageOutcome::Uploaded("https://img.test/file-2".into()));
    }

    #[tokio::test]
    async fn test_timeout_is_a_failed_outcome() {
        let service = service(SlowHost);
        let outcomes = service.upload_files(&[staged("a.png")]).await;
        assert!(matches!(&outcomes[0], ImageOutcome::Failed(reason) if reason.contains("timed out")));
    }

    #[tokio::test]
    async fn test_invalid_inline_payload_never_reaches_host() {
        let host = Arc::new(ScriptedHost::default());
        let service = ImageService::new(Arc::clone(&host) as Arc<dyn ImageHost>, Duration::from_millis(50));

        let outcome = service.upload_inline("data:text/plain;base64,aGk=").await;

        assert!(matches!(outcome, ImageOutcome::Failed(_)));
        assert_eq!(host.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_inline_upload_succeeds() {
        let service = service(ScriptedHost::default());
        let outcome = service.upload_inline("data:image/png;base64,aGVsbG8=").await;
        assert_eq!(outcome, ImageOutcome::Uploaded("https://img.test/inline-0".into()));
    }

    #[test]
    fn test_resolve_prefers_inline() {
        let inline = ImageOutcome::Uploaded("inline".into());
        let files = [ImageOutcome::Uploaded("first".into())];
        assert_eq!(resolve_legacy_image(Some(&inline), &files).as_deref(), Some("inline"));
    }

    #[test]
    fn test_resolve_falls_back_to_first_successful_file() {
        let failed_inline = ImageOutcome::Failed("bad base64".into());
        let files = [
            ImageOutcome::Failed("timeout".into()),
            ImageOutcome::Uploaded("second".into()),
            ImageOutcome::Uploaded("third".into()),
        ];
        assert_eq!(resolve_legacy_image(None, &files).as_deref(), Some("second"));
        assert_eq!(resolve_legacy_image(Some(&failed_inline), &files).as_deref(), Some("second"));
        assert_eq!(resolve_legacy_image(Some(&failed_inline), &[]), None);
    }
}
