use time::OffsetDateTime;
use uuid::Uuid;

/// Version of the persisted message layout. Every version carries the attachments list.
pub const MESSAGE_SCHEMA_VERSION: i16 = 1;

/// A non-image file held in local static storage and embedded in exactly one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
    pub media_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: String,
    pub legacy_image_url: Option<String>,
    pub attachments: Vec<Attachment>,
    pub schema_version: i16,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRejection {
    Empty,
}

impl MessageRejection {
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Empty => "text or files required",
        }
    }
}

/// A validated message that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: String,
    pub legacy_image_url: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl NewMessage {
    /// Assembles a message record, rejecting one with no text, no image and no attachments.
    ///
    /// # Errors
    /// Returns `MessageRejection::Empty` if the message would carry nothing.
    pub fn build(
        sender_id: Uuid,
        receiver_id: Uuid,
        text: &str,
        legacy_image_url: Option<String>,
        attachments: Vec<Attachment>,
    ) -> Result<Self, MessageRejection> {
        let text = text.trim();
        if text.is_empty() && legacy_image_url.is_none() && attachments.is_empty() {
            return Err(MessageRejection::Empty);
        }

        Ok(Self {
            id: Uuid::now_v7(),
            sender_id,
            receiver_id,
            text: text.to_string(),
            legacy_image_url,
            attachments,
        })
    }

    #[must_use]
    pub fn into_message(self, created_at: OffsetDateTime) -> Message {
        Message {
            id: self.id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            text: self.text,
            legacy_image_url: self.legacy_image_url,
            attachments: self.attachments,
            schema_version: MESSAGE_SCHEMA_VERSION,
            created_at,
        }
    }
}
