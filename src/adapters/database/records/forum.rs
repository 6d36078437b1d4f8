use crate::domain::forum::{Post, Reply};
use crate::domain::user::AuthorSummary;
use time::OffsetDateTime;
use uuid::Uuid;

/// A post joined with its author's public profile.
#[derive(Debug, sqlx::FromRow)]
pub struct PostRecord {
    pub(crate) id: Uuid,
    pub(crate) author_id: Uuid,
    pub(crate) author_name: String,
    pub(crate) author_pic: Option<String>,
    pub(crate) title: String,
    pub(crate) body: String,
    pub(crate) tags: Vec<String>,
    pub(crate) replies_count: i32,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<PostRecord> for Post {
    fn from(r: PostRecord) -> Self {
        Self {
            id: r.id,
            author: AuthorSummary { id: r.author_id, full_name: r.author_name, profile_pic: r.author_pic },
            title: r.title,
            body: r.body,
            tags: r.tags,
            replies_count: r.replies_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ReplyRecord {
    pub(crate) id: Uuid,
    pub(crate) post_id: Uuid,
    pub(crate) author_id: Uuid,
    pub(crate) author_name: String,
    pub(crate) author_pic: Option<String>,
    pub(crate) body: String,
    pub(crate) created_at: OffsetDateTime,
}

impl From<ReplyRecord> for Reply {
    fn from(r: ReplyRecord) -> Self {
        Self {
            id: r.id,
            post_id: r.post_id,
            author: AuthorSummary { id: r.author_id, full_name: r.author_name, profile_pic: r.author_pic },
            body: r.body,
            created_at: r.created_at,
        }
    }
}
