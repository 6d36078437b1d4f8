use crate::adapters::database::records::{PostRecord, ReplyRecord};
use crate::adapters::database::{DbPool, ForumStore};
use crate::domain::forum::{NewPost, NewReply, Post, Reply};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use uuid::Uuid;

const POST_SELECT: &str = r"
    SELECT p.id, p.author_id, u.full_name AS author_name, u.profile_pic AS author_pic,
           p.title, p.body, p.tags, p.replies_count, p.created_at, p.updated_at
    FROM posts p
    JOIN users u ON u.id = p.author_id
";

const REPLY_SELECT: &str = r"
    SELECT r.id, r.post_id, r.author_id, u.full_name AS author_name, u.profile_pic AS author_pic,
           r.body, r.created_at
    FROM replies r
    JOIN users u ON u.id = r.author_id
";

#[derive(Clone, Debug)]
pub struct ForumRepository {
    pool: DbPool,
}

impl ForumRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_post(&self, id: Uuid) -> Result<Option<Post>> {
        let record = sqlx::query_as::<_, PostRecord>(&format!("{POST_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Into::into))
    }
}

#[async_trait]
impl ForumStore for ForumRepository {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_posts(&self) -> Result<Vec<Post>> {
        let records = sqlx::query_as::<_, PostRecord>(&format!("{POST_SELECT} ORDER BY p.created_at DESC, p.id DESC"))
            .fetch_all(&self.pool)
            .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find_post(&self, id: Uuid) -> Result<Option<Post>> {
        self.fetch_post(id).await
    }

    #[tracing::instrument(level = "debug", skip(self, post), fields(post_id = %post.id))]
    async fn create_post(&self, post: NewPost) -> Result<Post> {
        sqlx::query("INSERT INTO posts (id, author_id, title, body, tags) VALUES ($1, $2, $3, $4, $5)")
            .bind(post.id)
            .bind(post.author_id)
            .bind(&post.title)
            .bind(&post.body)
            .bind(&post.tags)
            .execute(&self.pool)
            .await?;

        self.fetch_post(post.id).await?.ok_or_else(|| AppError::InternalMsg("Inserted post vanished".into()))
    }

    /// Replies go with the post via `ON DELETE CASCADE`.
    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_post(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM posts WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_replies(&self, post_id: Uuid) -> Result<Vec<Reply>> {
        let records = sqlx::query_as::<_, ReplyRecord>(&format!(
            "{REPLY_SELECT} WHERE r.post_id = $1 ORDER BY r.created_at ASC, r.id ASC"
        ))
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self, reply), fields(post_id = %reply.post_id))]
    async fn create_reply(&self, reply: NewReply) -> Result<Reply> {
        let mut tx = self.pool.begin().await?;

        let bumped = sqlx::query("UPDATE posts SET replies_count = replies_count + 1, updated_at = NOW() WHERE id = $1")
            .bind(reply.post_id)
            .execute(&mut *tx)
            .await?;
        if bumped.rows_affected() == 0 {
            return Err(AppError::NotFound("Post not found".into()));
        }

        sqlx::query("INSERT INTO replies (id, post_id, author_id, body) VALUES ($1, $2, $3, $4)")
            .bind(reply.id)
            .bind(reply.post_id)
            .bind(reply.author_id)
            .bind(&reply.body)
            .execute(&mut *tx)
            .await?;

        let record = sqlx::query_as::<_, ReplyRecord>(&format!("{REPLY_SELECT} WHERE r.id = $1"))
            .bind(reply.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(record.into())
    }
}
