use crate::domain::user::AuthorSummary;
use time::OffsetDateTime;
use uuid::Uuid;

pub const MAX_TITLE_CHARS: usize = 160;
pub const MAX_POST_BODY_CHARS: usize = 20_000;
pub const MAX_REPLY_BODY_CHARS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub author: AuthorSummary,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub replies_count: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author: AuthorSummary,
    pub body: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

impl NewPost {
    /// Trims and validates a post submission.
    ///
    /// # Errors
    /// Returns a client-facing reason if the title or body is missing or too long.
    pub fn build(author_id: Uuid, title: &str, body: &str, tags: &[String]) -> Result<Self, &'static str> {
        let (title, body) = (title.trim(), body.trim());
        if title.is_empty() || body.is_empty() {
            return Err("Title and body are required");
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err("Title is too long");
        }
        if body.chars().count() > MAX_POST_BODY_CHARS {
            return Err("Body is too long");
        }

        Ok(Self {
            id: Uuid::now_v7(),
            author_id,
            title: title.to_string(),
            body: body.to_string(),
            tags: tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).map(str::to_string).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReply {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
}

impl NewReply {
    /// # Errors
    /// Returns a client-facing reason if the body is missing or too long.
    pub fn build(post_id: Uuid, author_id: Uuid, body: &str) -> Result<Self, &'static str> {
        let body = body.trim();
        if body.is_empty() {
            return Err("Reply body required");
        }
        if body.chars().count() > MAX_REPLY_BODY_CHARS {
            return Err("Reply is too long");
        }
        Ok(Self { id: Uuid::now_v7(), post_id, author_id, body: body.to_string() })
    }
}
