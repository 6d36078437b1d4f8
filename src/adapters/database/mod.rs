pub mod forum_repo;
pub mod message_repo;
pub mod records;
pub mod user_repo;

pub use forum_repo::ForumRepository;
pub use message_repo::MessageRepository;
pub use user_repo::UserRepository;

use crate::config::DatabaseConfig;
use crate::domain::forum::{NewPost, NewReply, Post, Reply};
use crate::domain::message::{Message, NewMessage};
use crate::domain::user::{NewUser, User};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use uuid::Uuid;

pub type DbPool = Pool<Postgres>;

/// Initializes the database connection pool.
///
/// # Errors
/// Returns `sqlx::Error` if the connection fails.
pub async fn init_pool(config: &DatabaseConfig) -> std::result::Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .connect(&config.url)
        .await
}

/// Durable home of direct messages. Records are written once and never updated.
#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug + 'static {
    /// Persists one message in a single write; either the whole record exists afterwards or nothing does.
    async fn insert(&self, message: NewMessage) -> Result<Message>;

    /// Every message exchanged between the two users, oldest first, ties in insertion order.
    async fn conversation(&self, user_a: Uuid, user_b: Uuid) -> Result<Vec<Message>>;

    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait UserStore: Send + Sync + std::fmt::Debug + 'static {
    /// # Errors
    /// Returns `AppError::Conflict` if the email is already registered.
    async fn create(&self, user: NewUser) -> Result<User>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// All users except `id`, ordered by name.
    async fn list_except(&self, id: Uuid) -> Result<Vec<User>>;
}

#[async_trait]
pub trait ForumStore: Send + Sync + std::fmt::Debug + 'static {
    /// Newest first.
    async fn list_posts(&self) -> Result<Vec<Post>>;

    async fn find_post(&self, id: Uuid) -> Result<Option<Post>>;

    async fn create_post(&self, post: NewPost) -> Result<Post>;

    /// Removes the post together with its replies.
    async fn delete_post(&self, id: Uuid) -> Result<()>;

    /// Oldest first.
    async fn list_replies(&self, post_id: Uuid) -> Result<Vec<Reply>>;

    /// Inserts the reply and bumps the post's reply counter atomically.
    async fn create_reply(&self, reply: NewReply) -> Result<Reply>;
}
