use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::forum::{CreatePost, CreateReply, Deleted, Post, PostDetail, Reply};
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

pub async fn list_posts(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let posts = state.forum_service.list_posts().await?;
    Ok(Json(posts.into_iter().map(Post::from).collect::<Vec<_>>()))
}

pub async fn get_post(State(state): State<AppState>, Path(post_id): Path<Uuid>) -> Result<impl IntoResponse> {
    let (post, replies) = state.forum_service.get_post(post_id).await?;
    Ok(Json(PostDetail { post: post.into(), replies: replies.into_iter().map(Reply::from).collect() }))
}

pub async fn create_post(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePost>,
) -> Result<impl IntoResponse> {
    let post =
        state.forum_service.create_post(auth_user.user_id, &payload.title, &payload.body, &payload.tags).await?;
    Ok((StatusCode::CREATED, Json(Post::from(post))))
}

pub async fn delete_post(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.forum_service.delete_post(auth_user.user_id, post_id).await?;
    Ok(Json(Deleted { ok: true }))
}

pub async fn create_reply(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<CreateReply>,
) -> Result<impl IntoResponse> {
    let reply = state.forum_service.reply(auth_user.user_id, post_id, &payload.body).await?;
    Ok((StatusCode::CREATED, Json(Reply::from(reply))))
}
