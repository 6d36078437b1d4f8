use crate::adapters::database::{MessageStore, UserStore};
use crate::adapters::local_store::LocalStaticStore;
use crate::domain::message::{Message, NewMessage};
use crate::domain::notification::UserEvent;
use crate::domain::upload::{StagedFile, classify};
use crate::error::{AppError, Result};
use crate::services::image_service::{ImageService, resolve_legacy_image};
use crate::services::notification_service::NotificationService;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
    attachments_per_message: Histogram<u64>,
    history_size: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("agora-server");
        Self {
            sent_total: meter
                .u64_counter("agora_messages_sent_total")
                .with_description("Message send attempts by outcome")
                .build(),
            attachments_per_message: meter
                .u64_histogram("agora_message_attachments")
                .with_description("Number of local attachments on a persisted message")
                .build(),
            history_size: meter
                .u64_histogram("agora_message_history_size")
                .with_description("Number of messages returned by a history fetch")
                .build(),
        }
    }
}

/// Everything the intake collected for one send.
#[derive(Debug, Default)]
pub struct SendRequest {
    pub text: String,
    /// Legacy base64 image field.
    pub inline_image: Option<String>,
    /// Files already written to the upload directory, in upload order.
    pub files: Vec<StagedFile>,
}

#[derive(Clone, Debug)]
pub struct MessageService {
    messages: Arc<dyn MessageStore>,
    users: Arc<dyn UserStore>,
    images: ImageService,
    local: LocalStaticStore,
    notifier: NotificationService,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(
        messages: Arc<dyn MessageStore>,
        users: Arc<dyn UserStore>,
        images: ImageService,
        local: LocalStaticStore,
        notifier: NotificationService,
    ) -> Self {
        Self { messages, users, images, local, notifier, metrics: Metrics::new() }
    }

    /// Runs the ingestion pipeline: recipient checks, classification, remote image uploads,
    /// local attachment descriptors, a single insert, then best-effort notification.
    ///
    /// Staged files are removed whenever nothing is persisted. Image staged copies are
    /// always removed once their upload has been attempted.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if the recipient is the sender or the message would be empty.
    /// Returns `AppError::NotFound` if the recipient does not exist.
    /// Returns `AppError::Database` if the message cannot be stored.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, request),
        fields(sender_id = %sender_id, recipient_id = %recipient_id, files = request.files.len())
    )]
    pub async fn send(&self, sender_id: Uuid, recipient_id: Uuid, request: SendRequest) -> Result<Message> {
        let SendRequest { text, inline_image, files } = request;

        if let Err(e) = self.check_recipient(sender_id, recipient_id).await {
            self.local.discard(&files).await;
            self.metrics.sent_total.add(1, &[KeyValue::new("status", "rejected")]);
            return Err(e);
        }

        let classified = classify(files);

        let inline_outcome = match inline_image.as_deref().map(str::trim) {
            Some(encoded) if !encoded.is_empty() => Some(self.images.upload_inline(encoded).await),
            _ => None,
        };
        let file_outcomes = self.images.upload_files(&classified.images).await;
        self.local.discard(&classified.images).await;

        let legacy_image_url = resolve_legacy_image(inline_outcome.as_ref(), &file_outcomes);
        let attachments = classified.others.iter().map(|file| self.local.describe(file)).collect();

        let new_message = match NewMessage::build(sender_id, recipient_id, &text, legacy_image_url, attachments) {
            Ok(message) => message,
            Err(rejection) => {
                self.local.discard(&classified.others).await;
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "rejected")]);
                return Err(AppError::BadRequest(rejection.reason().to_string()));
            }
        };

        let message = match self.messages.insert(new_message).await {
            Ok(message) => message,
            Err(e) => {
                self.local.discard(&classified.others).await;
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "failure")]);
                return Err(e);
            }
        };

        self.metrics.sent_total.add(1, &[KeyValue::new("status", "success")]);
        self.metrics.attachments_per_message.record(message.attachments.len() as u64, &[]);
        tracing::debug!(message_id = %message.id, "Message persisted");

        self.notifier.notify(recipient_id, UserEvent::NewMessage(message.clone()));

        Ok(message)
    }

    async fn check_recipient(&self, sender_id: Uuid, recipient_id: Uuid) -> Result<()> {
        if sender_id == recipient_id {
            return Err(AppError::BadRequest("Cannot send a message to yourself".into()));
        }
        if self.users.find_by_id(recipient_id).await?.is_none() {
            return Err(AppError::NotFound("Recipient not found".into()));
        }
        Ok(())
    }

    /// Messages exchanged between the caller and `other_id`, oldest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(user_id = %user_id, other_id = %other_id))]
    pub async fn conversation(&self, user_id: Uuid, other_id: Uuid) -> Result<Vec<Message>> {
        let messages = self.messages.conversation(user_id, other_id).await?;
        self.metrics.history_size.record(messages.len() as u64, &[]);
        Ok(messages)
    }
}
