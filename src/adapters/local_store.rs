use crate::domain::message::Attachment;
use crate::domain::upload::{StagedFile, stored_name};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Bounded so a directory full of clashing names cannot spin forever.
const MAX_NAME_ATTEMPTS: i64 = 1_000;

/// Upload directory exposed under a fixed public prefix.
///
/// Every stored name is `<unix-millis>-<sanitized original>`; the file is created
/// exclusively and the timestamp is advanced on a clash, so two uploads in the same
/// process never share a name.
#[derive(Clone, Debug)]
pub struct LocalStaticStore {
    dir: PathBuf,
    public_prefix: String,
}

impl LocalStaticStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, public_prefix: &str) -> Self {
        Self { dir: dir.into(), public_prefix: format!("/{}", public_prefix.trim_matches('/')) }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// # Errors
    /// Returns the underlying I/O error if the directory cannot be created.
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    #[must_use]
    pub fn public_url(&self, stored_name: &str) -> String {
        format!("{}/{stored_name}", self.public_prefix)
    }

    /// Writes `bytes` under a fresh collision-free name.
    ///
    /// # Errors
    /// Returns the underlying I/O error if the file cannot be created or written.
    #[tracing::instrument(level = "debug", skip(self, bytes), fields(size = bytes.len()))]
    pub async fn stage(&self, original_name: &str, media_type: &str, bytes: &[u8]) -> std::io::Result<StagedFile> {
        let base_ts = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let base_ts = i64::try_from(base_ts).unwrap_or(i64::MAX);

        for offset in 0..MAX_NAME_ATTEMPTS {
            let name = stored_name(base_ts.saturating_add(offset), original_name);
            let path = self.dir.join(&name);

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            };

            if let Err(e) = async {
                file.write_all(bytes).await?;
                file.flush().await
            }
            .await
            {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e);
            }

            return Ok(StagedFile {
                original_name: original_name.to_string(),
                stored_name: name,
                path,
                media_type: media_type.to_string(),
                size_bytes: bytes.len() as u64,
            });
        }

        Err(std::io::Error::new(ErrorKind::AlreadyExists, "no free upload name"))
    }

    /// Descriptor for a staged non-image file.
    #[must_use]
    pub fn describe(&self, file: &StagedFile) -> Attachment {
        Attachment {
            url: self.public_url(&file.stored_name),
            filename: file.original_name.clone(),
            media_type: file.media_type.clone(),
            size_bytes: file.size_bytes,
        }
    }

    /// Best-effort removal of staged files that will never be referenced.
    pub async fn discard(&self, files: &[StagedFile]) {
        for file in files {
            if let Err(e) = tokio::fs::remove_file(&file.path).await
                && e.kind() != ErrorKind::NotFound
            {
                tracing::warn!(error = %e, file = %file.stored_name, "Failed to remove staged upload");
            }
        }
    }
}
