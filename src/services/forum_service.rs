use crate::adapters::database::ForumStore;
use crate::domain::forum::{NewPost, NewReply, Post, Reply};
use crate::error::{AppError, Result};
use opentelemetry::{global, metrics::Counter};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    posts_created_total: Counter<u64>,
    replies_created_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("agora-server");
        Self {
            posts_created_total: meter
                .u64_counter("agora_forum_posts_created_total")
                .with_description("Total number of forum posts created")
                .build(),
            replies_created_total: meter
                .u64_counter("agora_forum_replies_created_total")
                .with_description("Total number of forum replies created")
                .build(),
        }
    }
}

fn post_not_found() -> AppError {
    AppError::NotFound("Post not found".into())
}

#[derive(Clone, Debug)]
pub struct ForumService {
    store: Arc<dyn ForumStore>,
    metrics: Metrics,
}

impl ForumService {
    #[must_use]
    pub fn new(store: Arc<dyn ForumStore>) -> Self {
        Self { store, metrics: Metrics::new() }
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        self.store.list_posts().await
    }

    /// A post with its replies, oldest reply first.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the post does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(post_id = %post_id))]
    pub async fn get_post(&self, post_id: Uuid) -> Result<(Post, Vec<Reply>)> {
        let post = self.store.find_post(post_id).await?.ok_or_else(post_not_found)?;
        let replies = self.store.list_replies(post_id).await?;
        Ok((post, replies))
    }

    /// # Errors
    /// Returns `AppError::BadRequest` if the title or body is missing or too long.
    #[tracing::instrument(err(level = "warn"), skip(self, title, body, tags), fields(author_id = %author_id))]
    pub async fn create_post(&self, author_id: Uuid, title: &str, body: &str, tags: &[String]) -> Result<Post> {
        let new_post = NewPost::build(author_id, title, body, tags).map_err(|m| AppError::BadRequest(m.into()))?;
        let post = self.store.create_post(new_post).await?;
        self.metrics.posts_created_total.add(1, &[]);
        tracing::debug!(post_id = %post.id, "Post created");
        Ok(post)
    }

    /// Deletes a post and its replies. Only the author may do this.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the post does not exist.
    /// Returns `AppError::Forbidden` if the caller is not the author.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(post_id = %post_id, user_id = %user_id))]
    pub async fn delete_post(&self, user_id: Uuid, post_id: Uuid) -> Result<()> {
        let post = self.store.find_post(post_id).await?.ok_or_else(post_not_found)?;
        if post.author.id != user_id {
            return Err(AppError::Forbidden("Not allowed".into()));
        }
        self.store.delete_post(post_id).await
    }

    /// # Errors
    /// Returns `AppError::BadRequest` if the body is missing or too long.
    /// Returns `AppError::NotFound` if the post does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self, body), fields(post_id = %post_id, author_id = %author_id))]
    pub async fn reply(&self, author_id: Uuid, post_id: Uuid, body: &str) -> Result<Reply> {
        let new_reply = NewReply::build(post_id, author_id, body).map_err(|m| AppError::BadRequest(m.into()))?;
        let reply = self.store.create_reply(new_reply).await?;
        self.metrics.replies_created_total.add(1, &[]);
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::AuthorSummary;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::OffsetDateTime;

    #[derive(Debug, Default)]
    struct MemoryForum {
        posts: Mutex<Vec<Post>>,
        replies: Mutex<Vec<Reply>>,
    }

    fn author(id: Uuid) -> AuthorSummary {
        AuthorSummary { id, full_name: "Author".into(), profile_pic: None }
    }

    #[async_trait]
    impl ForumStore for MemoryForum {
        async fn list_posts(&self) -> Result<Vec<Post>> {
            Ok(self.posts.lock().unwrap().iter().rev().cloned().collect())
        }

        async fn find_post(&self, id: Uuid) -> Result<Option<Post>> {
            Ok(self.posts.lock().unwrap().iter().find(|p| p.id == id).cloned())
        }

        async fn create_post(&self, post: NewPost) -> Result<Post> {
            let now = OffsetDateTime::now_utc();
            let post = Post {
                id: post.id,
                author: author(post.author_id),
                title: post.title,
                body: post.body,
                tags: post.tags,
                replies_count: 0,
                created_at: now,
                updated_at: now,
            };
            self.posts.lock().unwrap().push(post.clone());
            Ok(post)
        }

        async fn delete_post(&self, id: Uuid) -> Result<()> {
            self.posts.lock().unwrap().retain(|p| p.id != id);
            self.replies.lock().unwrap().retain(|r| r.post_id != id);
            Ok(())
        }

        async fn list_replies(&self, post_id: Uuid) -> Result<Vec<Reply>> {
            Ok(self.replies.lock().unwrap().iter().filter(|r| r.post_id == post_id).cloned().collect())
        }

        async fn create_reply(&self, reply: NewReply) -> Result<Reply> {
            let mut posts = self.posts.lock().unwrap();
            let post = posts.iter_mut().find(|p| p.id == reply.post_id).ok_or_else(post_not_found)?;
            post.replies_count += 1;
            let reply = Reply {
                id: reply.id,
                post_id: reply.post_id,
                author: author(reply.author_id),
                body: reply.body,
                created_at: OffsetDateTime::now_utc(),
            };
            self.replies.lock().unwrap().push(reply.clone());
            Ok(reply)
        }
    }

    fn service() -> ForumService {
        ForumService::new(Arc::new(MemoryForum::default()))
    }

    #[tokio::test]
    async fn test_create_requires_title_and_body() {
        let service = service();
        let err = service.create_post(Uuid::new_v4(), "  ", "body", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Title and body are required"));
    }

    #[tokio::test]
    async fn test_reply_bumps_counter() {
        let service = service();
        let author_id = Uuid::new_v4();
        let post = service.create_post(author_id, "Hello", "World", &["rust".into()]).await.unwrap();

        service.reply(Uuid::new_v4(), post.id, "first").await.unwrap();
        service.reply(author_id, post.id, "second").await.unwrap();

        let (post, replies) = service.get_post(post.id).await.unwrap();
        assert_eq!(post.replies_count, 2);
        assert_eq!(replies.iter().map(|r| r.body.as_str()).collect::<Vec<_>>(), ["first", "second"]);
    }

    #[tokio::test]
    async fn test_reply_validation_and_missing_post() {
        let service = service();
        let err = service.reply(Uuid::new_v4(), Uuid::new_v4(), "   ").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Reply body required"));

        let err = service.reply(Uuid::new_v4(), Uuid::new_v4(), "hi").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_only_author_can_delete() {
        let service = service();
        let author_id = Uuid::new_v4();
        let post = service.create_post(author_id, "Title", "Body", &[]).await.unwrap();
        service.reply(Uuid::new_v4(), post.id, "reply").await.unwrap();

        let err = service.delete_post(Uuid::new_v4(), post.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == "Not allowed"));

        service.delete_post(author_id, post.id).await.unwrap();
        assert!(matches!(service.get_post(post.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(service.delete_post(author_id, post.id).await, Err(AppError::NotFound(_))));
    }
}
