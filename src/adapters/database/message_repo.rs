use crate::adapters::database::records::{AttachmentRecord, MessageRecord};
use crate::adapters::database::{DbPool, MessageStore};
use crate::domain::message::{MESSAGE_SCHEMA_VERSION, Message, NewMessage};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct MessageRepository {
    pool: DbPool,
}

impl MessageRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    /// Records a new message in the database.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, message), fields(message_id = %message.id))]
    async fn insert(&self, message: NewMessage) -> Result<Message> {
        let attachments: Vec<AttachmentRecord> = message.attachments.iter().map(Into::into).collect();

        let record = sqlx::query_as::<_, MessageRecord>(
            r"
            INSERT INTO messages (id, sender_id, receiver_id, text, image, attachments, schema_version)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, sender_id, receiver_id, text, image, attachments, schema_version, created_at
            ",
        )
        .bind(message.id)
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.text)
        .bind(&message.legacy_image_url)
        .bind(Json(attachments))
        .bind(MESSAGE_SCHEMA_VERSION)
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into())
    }

    /// Fetches the full conversation between two users.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self))]
    async fn conversation(&self, user_a: Uuid, user_b: Uuid) -> Result<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            r"
            SELECT id, sender_id, receiver_id, text, image, attachments, schema_version, created_at
            FROM messages
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
            ORDER BY created_at ASC, seq ASC
            ",
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
