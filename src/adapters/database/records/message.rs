use crate::domain::message::{Attachment, Message};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

/// Embedded attachment as stored in the `attachments` JSONB array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub(crate) url: String,
    pub(crate) filename: String,
    pub(crate) mimetype: String,
    pub(crate) size: u64,
}

impl From<&Attachment> for AttachmentRecord {
    fn from(a: &Attachment) -> Self {
        Self { url: a.url.clone(), filename: a.filename.clone(), mimetype: a.media_type.clone(), size: a.size_bytes }
    }
}

impl From<AttachmentRecord> for Attachment {
    fn from(r: AttachmentRecord) -> Self {
        Self { url: r.url, filename: r.filename, media_type: r.mimetype, size_bytes: r.size }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRecord {
    pub(crate) id: Uuid,
    pub(crate) sender_id: Uuid,
    pub(crate) receiver_id: Uuid,
    pub(crate) text: String,
    pub(crate) image: Option<String>,
    pub(crate) attachments: Json<Vec<AttachmentRecord>>,
    pub(crate) schema_version: i16,
    pub(crate) created_at: OffsetDateTime,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            sender_id: record.sender_id,
            receiver_id: record.receiver_id,
            text: record.text,
            legacy_image_url: record.image,
            attachments: record.attachments.0.into_iter().map(Into::into).collect(),
            schema_version: record.schema_version,
            created_at: record.created_at,
        }
    }
}
