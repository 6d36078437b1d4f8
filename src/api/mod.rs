use crate::adapters::local_store::LocalStaticStore;
use crate::api::rate_limit::log_rate_limit_events;
use crate::config::Config;
use crate::services::account_service::AccountService;
use crate::services::forum_service::ForumService;
use crate::services::health_service::HealthService;
use crate::services::message_service::MessageService;
use crate::services::notification_service::NotificationService;
use crate::services::rate_limit_service::RateLimitService;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, Request};
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod forum;
pub mod gateway;
pub mod health;
pub mod messages;
pub mod middleware;
pub mod rate_limit;
pub mod schemas;
pub mod upload;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub account_service: AccountService,
    pub forum_service: ForumService,
    pub message_service: MessageService,
    pub notification_service: NotificationService,
    pub rate_limit_service: RateLimitService,
    pub local_store: LocalStaticStore,
    pub shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

#[derive(Debug)]
pub struct ServiceContainer {
    pub account_service: AccountService,
    pub forum_service: ForumService,
    pub message_service: MessageService,
    pub notification_service: NotificationService,
    pub rate_limit_service: RateLimitService,
    pub local_store: LocalStaticStore,
}

/// Builds the public API router: auth, messaging, forum, gateway and `/uploads`.
///
/// # Panics
/// Panics if a rate limiter cannot be built from the configured rates.
pub fn app_router(config: Config, services: ServiceContainer, shutdown_rx: tokio::sync::watch::Receiver<bool>) -> Router {
    let extractor = services.rate_limit_service.extractor.clone();
    // Token bucket refilling `per_second` times a second, keyed by client IP.
    let route_limiter = |per_second: u32, burst: u32| {
        let refill_ns = 1_000_000_000 / per_second.max(1);
        let limiter = GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(refill_ns))
            .burst_size(burst.max(1))
            .key_extractor(extractor.clone())
            .finish()
            .expect("rate limiter settings produce a valid quota");
        Arc::new(limiter)
    };
    let standard_limiter = route_limiter(config.rate_limit.per_second, config.rate_limit.burst);
    // Signup and login hash passwords, so they get a stricter limit.
    let auth_limiter = route_limiter(config.rate_limit.auth_per_second, config.rate_limit.auth_burst);

    let body_limit = config.uploads.max_request_bytes();
    let upload_dir = services.local_store.dir().to_path_buf();
    let public_prefix = services.local_store.public_prefix().to_string();

    let state = AppState {
        config,
        account_service: services.account_service,
        forum_service: services.forum_service,
        message_service: services.message_service,
        notification_service: services.notification_service,
        rate_limit_service: services.rate_limit_service,
        local_store: services.local_store,
        shutdown_rx,
    };

    let auth_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .layer(GovernorLayer::new(auth_limiter));

    let message_routes = Router::new()
        .route("/messages", post(messages::send_message_to))
        .route("/messages/users", get(messages::list_users))
        .route("/messages/{userId}", get(messages::get_messages).post(messages::send_message))
        .layer(DefaultBodyLimit::max(body_limit));

    let api_routes = Router::new()
        .route("/auth/check", get(auth::check))
        .route("/posts", get(forum::list_posts).post(forum::create_post))
        .route("/posts/{id}", get(forum::get_post).delete(forum::delete_post))
        .route("/posts/{id}/replies", post(forum::create_reply))
        .route("/gateway", get(gateway::websocket_handler))
        .merge(message_routes)
        .layer(GovernorLayer::new(standard_limiter));

    Router::new()
        .nest("/api", auth_routes.merge(api_routes))
        .nest_service(&public_prefix, ServeDir::new(upload_dir))
        .layer(from_fn_with_state(state.clone(), log_rate_limit_events))
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(REQUEST_ID_HEADER)))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<RequestId>()
                        .and_then(|id| id.header_value().to_str().ok())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                        "user_id" = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(HeaderName::from_static(REQUEST_ID_HEADER), middleware::MakeRequestUuidOrHeader))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}
