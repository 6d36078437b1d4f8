use crate::domain::forum::{Post as DomainPost, Reply as DomainReply};
use crate::domain::user::AuthorSummary;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreatePost {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReply {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: Uuid,
    pub full_name: String,
    pub profile_pic: Option<String>,
}

impl From<AuthorSummary> for Author {
    fn from(a: AuthorSummary) -> Self {
        Self { id: a.id, full_name: a.full_name, profile_pic: a.profile_pic }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub author: Author,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub replies_count: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<DomainPost> for Post {
    fn from(p: DomainPost) -> Self {
        Self {
            id: p.id,
            author: p.author.into(),
            title: p.title,
            body: p.body,
            tags: p.tags,
            replies_count: p.replies_count,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author: Author,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<DomainReply> for Reply {
    fn from(r: DomainReply) -> Self {
        Self { id: r.id, post_id: r.post_id, author: r.author.into(), body: r.body, created_at: r.created_at }
    }
}

#[derive(Debug, Serialize)]
pub struct PostDetail {
    pub post: Post,
    pub replies: Vec<Reply>,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub ok: bool,
}
