use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::auth::{Login, Session, Signup, UserProfile};
use crate::error::Result;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

pub async fn signup(State(state): State<AppState>, Json(payload): Json<Signup>) -> Result<impl IntoResponse> {
    let session = state.account_service.signup(&payload.email, &payload.full_name, &payload.password).await?;
    Ok((StatusCode::CREATED, Json(Session::from(session))))
}

pub async fn login(State(state): State<AppState>, Json(payload): Json<Login>) -> Result<impl IntoResponse> {
    let session = state.account_service.login(&payload.email, &payload.password).await?;
    Ok(Json(Session::from(session)))
}

pub async fn check(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let user = state.account_service.profile(auth_user.user_id).await?;
    Ok(Json(UserProfile::from(user)))
}
