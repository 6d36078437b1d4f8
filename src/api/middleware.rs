use crate::api::AppState;
use crate::error::AppError;
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, Request, header, request::Parts},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

const SESSION_COOKIE: &str = "jwt";

#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ").map(str::trim)
}

fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find_map(|(name, value)| (name == SESSION_COOKIE).then_some(value))
}

/// Session token from `Authorization: Bearer` or, failing that, the `jwt` cookie.
pub(crate) fn session_token(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(AppError::AuthError)?;
        let user_id = state.account_service.verify_token(token)?;

        tracing::Span::current().record("user_id", tracing::field::display(user_id));

        Ok(Self { user_id })
    }
}

/// Reuses a well-formed incoming `x-request-id`, otherwise mints a UUID.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuidOrHeader;

impl MakeRequestId for MakeRequestUuidOrHeader {
    fn make_request_id<B>(&mut self, request: &Request<B>) -> Option<RequestId> {
        let incoming = request
            .headers()
            .get("x-request-id")
            .filter(|v| v.to_str().is_ok_and(|s| !s.is_empty() && s.len() <= 128))
            .cloned();

        let value = incoming.or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok())?;
        Some(RequestId::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_cookie_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; jwt=tok123; other=1"));
        assert_eq!(cookie_token(&headers), Some("tok123"));

        headers.insert(header::COOKIE, HeaderValue::from_static("jwtx=nope"));
        assert_eq!(cookie_token(&headers), None);
    }

    #[test]
    fn test_request_id_reuses_header() {
        let req = Request::builder().header("x-request-id", "abc").body(()).unwrap();
        let id = MakeRequestUuidOrHeader.make_request_id(&req).unwrap();
        assert_eq!(id.header_value(), "abc");

        let req = Request::builder().body(()).unwrap();
        let id = MakeRequestUuidOrHeader.make_request_id(&req).unwrap();
        assert!(Uuid::parse_str(id.header_value().to_str().unwrap()).is_ok());
    }
}
