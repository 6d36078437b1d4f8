use std::path::PathBuf;

/// Media types accepted by the upload intake. Anything else is rejected before the message pipeline runs.
pub const ALLOWED_MEDIA_TYPES: [&str; 7] = [
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "application/pdf",
    "text/plain",
    "application/zip",
];

const IMAGE_PREFIX: &str = "image/";

/// Reduces a declared `Content-Type` to its lower-cased `type/subtype`, dropping parameters.
#[must_use]
pub fn normalize_media_type(declared: &str) -> String {
    declared.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

#[must_use]
pub fn is_allowed_media_type(media_type: &str) -> bool {
    ALLOWED_MEDIA_TYPES.contains(&media_type)
}

/// Classification trusts the declared media type; there is no content sniffing.
#[must_use]
pub fn is_image(media_type: &str) -> bool {
    media_type.starts_with(IMAGE_PREFIX)
}

/// Replaces every character outside `[A-Za-z0-9.\-_]` with `_`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' }).collect()
}

/// Name under which a file is written to the upload directory.
#[must_use]
pub fn stored_name(timestamp_ms: i64, original_name: &str) -> String {
    format!("{timestamp_ms}-{}", sanitize_filename(original_name))
}

/// A file the intake has already written to local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Client-supplied name, for display only.
    pub original_name: String,
    /// Generated, collision-resistant name inside the upload directory.
    pub stored_name: String,
    pub path: PathBuf,
    pub media_type: String,
    pub size_bytes: u64,
}

impl StagedFile {
    #[must_use]
    pub fn is_image(&self) -> bool {
        is_image(&self.media_type)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClassifiedFiles {
    pub images: Vec<StagedFile>,
    pub others: Vec<StagedFile>,
}

/// Splits uploads into remote-host candidates and local attachments, preserving upload order on each side.
#[must_use]
pub fn classify(files: Vec<StagedFile>) -> ClassifiedFiles {
    let (images, others) = files.into_iter().partition(StagedFile::is_image);
    ClassifiedFiles { images, others }
}
