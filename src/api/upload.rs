use crate::adapters::local_store::LocalStaticStore;
use crate::config::UploadConfig;
use crate::domain::upload::{StagedFile, is_allowed_media_type, normalize_media_type};
use crate::error::{AppError, Result};
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use uuid::Uuid;

const FILES_FIELD: &str = "files";

/// Everything a multipart send carried, with files already staged on disk.
#[derive(Debug, Default)]
pub struct MessageForm {
    pub text: String,
    pub image: Option<String>,
    pub recipient_id: Option<Uuid>,
    pub files: Vec<StagedFile>,
}

fn multipart_error(e: &MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body too large".into())
    } else {
        AppError::BadRequest(format!("Malformed multipart body: {}", e.body_text()))
    }
}

/// Parses a multipart send, enforcing the file count, per-file size and media type limits.
///
/// On any error the files staged so far are removed before returning.
///
/// # Errors
/// Returns `AppError::BadRequest` for too many files or a malformed form,
/// `AppError::PayloadTooLarge` for an oversized file and
/// `AppError::UnsupportedMediaType` for a media type outside the allow-list.
#[tracing::instrument(skip_all)]
pub async fn read_message_form(
    mut multipart: Multipart,
    store: &LocalStaticStore,
    limits: &UploadConfig,
) -> Result<MessageForm> {
    let mut form = MessageForm::default();

    let result = async {
        while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                FILES_FIELD | "file" => {
                    if form.files.len() >= limits.max_files {
                        return Err(AppError::BadRequest(format!("Too many files (max {})", limits.max_files)));
                    }
                    let staged = stage_field(field, store, limits).await?;
                    form.files.push(staged);
                }
                "text" => form.text = field.text().await.map_err(|e| multipart_error(&e))?,
                "image" => {
                    let value = field.text().await.map_err(|e| multipart_error(&e))?;
                    if !value.trim().is_empty() {
                        form.image = Some(value);
                    }
                }
                "recipientId" => {
                    let value = field.text().await.map_err(|e| multipart_error(&e))?;
                    let id = value.trim().parse().map_err(|_| AppError::BadRequest("Invalid recipientId".into()))?;
                    form.recipient_id = Some(id);
                }
                _ => tracing::debug!(field = %name, "Ignoring unknown form field"),
            }
        }
        Ok(())
    }
    .await;

    match result {
        Ok(()) => Ok(form),
        Err(e) => {
            store.discard(&form.files).await;
            Err(e)
        }
    }
}

async fn stage_field(mut field: Field<'_>, store: &LocalStaticStore, limits: &UploadConfig) -> Result<StagedFile> {
    let original_name = field.file_name().unwrap_or("file").to_string();
    let media_type = normalize_media_type(field.content_type().unwrap_or("application/octet-stream"));

    if !is_allowed_media_type(&media_type) {
        return Err(AppError::UnsupportedMediaType(format!("Unsupported file type: {media_type}")));
    }

    let mut data = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(&e))? {
        if data.len() + chunk.len() > limits.max_file_size_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File {original_name} exceeds {} bytes",
                limits.max_file_size_bytes
            )));
        }
        data.extend_from_slice(&chunk);
    }

    store.stage(&original_name, &media_type, &data).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to write upload to disk");
        AppError::InternalMsg(format!("Failed to stage upload: {e}"))
    })
}
