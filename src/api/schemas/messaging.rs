use crate::domain::message::{Attachment as DomainAttachment, Message as DomainMessage};
use crate::domain::notification::UserEvent;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
    pub mimetype: String,
    pub size: u64,
}

impl From<DomainAttachment> for Attachment {
    fn from(a: DomainAttachment) -> Self {
        Self { url: a.url, filename: a.filename, mimetype: a.media_type, size: a.size_bytes }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: String,
    /// Single legacy image URL; absent when the message has none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub attachments: Vec<Attachment>,
    pub schema_version: i16,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<DomainMessage> for Message {
    fn from(m: DomainMessage) -> Self {
        Self {
            id: m.id,
            sender_id: m.sender_id,
            receiver_id: m.receiver_id,
            text: m.text,
            image: m.legacy_image_url,
            attachments: m.attachments.into_iter().map(Into::into).collect(),
            schema_version: m.schema_version,
            created_at: m.created_at,
        }
    }
}

/// JSON body accepted by the send routes when no files are attached.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    #[serde(default)]
    pub text: String,
    /// Legacy base64 image, either a data URI or bare base64.
    pub image: Option<String>,
    /// Only read by the route without a recipient path segment.
    pub recipient_id: Option<Uuid>,
}

/// Server to client WebSocket frame.
#[derive(Debug, Serialize)]
pub struct GatewayFrame {
    pub event: &'static str,
    pub data: Message,
}

impl From<UserEvent> for GatewayFrame {
    fn from(event: UserEvent) -> Self {
        let name = event.name();
        match event {
            UserEvent::NewMessage(message) => Self { event: name, data: message.into() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::NewMessage;

    #[test]
    fn test_message_without_image_omits_field() {
        let msg = NewMessage::build(Uuid::new_v4(), Uuid::new_v4(), "hi", None, Vec::new())
            .unwrap()
            .into_message(OffsetDateTime::UNIX_EPOCH);

        let json = serde_json::to_value(Message::from(msg)).unwrap();

        assert!(json.get("image").is_none());
        assert_eq!(json["text"], "hi");
        assert_eq!(json["attachments"], serde_json::json!([]));
        assert_eq!(json["schemaVersion"], 1);
        assert_eq!(json["createdAt"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_gateway_frame_shape() {
        let attachment = DomainAttachment {
            url: "/uploads/1-a.txt".into(),
            filename: "a.txt".into(),
            media_type: "text/plain".into(),
            size_bytes: 3,
        };
        let msg = NewMessage::build(Uuid::new_v4(), Uuid::new_v4(), "", Some("https://img/x".into()), vec![attachment])
            .unwrap()
            .into_message(OffsetDateTime::now_utc());

        let json = serde_json::to_value(GatewayFrame::from(UserEvent::NewMessage(msg))).unwrap();

        assert_eq!(json["event"], "newMessage");
        assert_eq!(json["data"]["image"], "https://img/x");
        assert_eq!(json["data"]["attachments"][0]["mimetype"], "text/plain");
        assert_eq!(json["data"]["attachments"][0]["size"], 3);
    }
}
