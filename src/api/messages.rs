use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::auth::UserProfile;
use crate::api::schemas::messaging::{Message, SendMessage};
use crate::api::upload::read_message_form;
use crate::error::{AppError, Result};
use crate::services::message_service::SendRequest;
use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use uuid::Uuid;

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
}

/// Reads either a multipart form (files staged on disk) or a legacy JSON body.
async fn read_send_body(state: &AppState, req: Request) -> Result<(Option<Uuid>, SendRequest)> {
    if is_multipart(&req) {
        let multipart = Multipart::from_request(req, state).await.map_err(|e| AppError::BadRequest(e.body_text()))?;
        let form = read_message_form(multipart, &state.local_store, &state.config.uploads).await?;
        return Ok((
            form.recipient_id,
            SendRequest { text: form.text, inline_image: form.image, files: form.files },
        ));
    }

    let body = Bytes::from_request(req, state).await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge("Request body too large".into())
        } else {
            AppError::BadRequest(e.body_text())
        }
    })?;
    let payload: SendMessage = if body.iter().all(u8::is_ascii_whitespace) {
        SendMessage::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?
    };

    Ok((payload.recipient_id, SendRequest { text: payload.text, inline_image: payload.image, files: Vec::new() }))
}

/// Sends a message to the recipient named in the path.
///
/// # Errors
/// Returns `AppError::BadRequest` if the message is empty or the body is malformed.
/// Returns `AppError::NotFound` if the recipient does not exist.
pub async fn send_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(recipient_id): Path<Uuid>,
    req: Request,
) -> Result<impl IntoResponse> {
    let (_, request) = read_send_body(&state, req).await?;
    let message = state.message_service.send(auth_user.user_id, recipient_id, request).await?;
    Ok((StatusCode::CREATED, Json(Message::from(message))))
}

/// Sends a message to the recipient named by the `recipientId` body field.
///
/// # Errors
/// Returns `AppError::BadRequest` if `recipientId` is missing, or as for `send_message`.
pub async fn send_message_to(
    auth_user: AuthUser,
    State(state): State<AppState>,
    req: Request,
) -> Result<impl IntoResponse> {
    let (recipient_id, request) = read_send_body(&state, req).await?;
    let Some(recipient_id) = recipient_id else {
        state.local_store.discard(&request.files).await;
        return Err(AppError::BadRequest("recipientId is required".into()));
    };
    let message = state.message_service.send(auth_user.user_id, recipient_id, request).await?;
    Ok((StatusCode::CREATED, Json(Message::from(message))))
}

/// Conversation between the caller and `user_id`, oldest first.
///
/// # Errors
/// Returns `AppError::Database` if the query fails.
pub async fn get_messages(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let messages = state.message_service.conversation(auth_user.user_id, user_id).await?;
    Ok(Json(messages.into_iter().map(Message::from).collect::<Vec<_>>()))
}

/// Every user except the caller, for the chat sidebar.
///
/// # Errors
/// Returns `AppError::Database` if the query fails.
pub async fn list_users(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let users = state.account_service.directory(auth_user.user_id).await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect::<Vec<_>>()))
}
