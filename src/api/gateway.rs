use crate::api::AppState;
use crate::api::middleware::session_token;
use crate::api::schemas::messaging::GatewayFrame;
use crate::domain::notification::UserEvent;
use axum::{
    extract::{
        Query, State,
        ws::{CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade, close_code},
    },
    http::{Extensions, HeaderMap, StatusCode},
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use opentelemetry::{KeyValue, global};
use serde::Deserialize;
use tower_http::request_id::RequestId;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    token: Option<String>,
}

/// Upgrades to a WebSocket once the caller's token checks out.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    extensions: Extensions,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let request_id = extensions
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let Some(token) = params.token.as_deref().or_else(|| session_token(&headers)) else {
        tracing::warn!("WebSocket handshake failed: missing token");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match state.account_service.verify_token(token) {
        Ok(user_id) => ws.on_upgrade(move |socket| handle_socket(socket, state, user_id, request_id)),
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket handshake failed: invalid token");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

fn encode_event(event: UserEvent) -> Option<WsMessage> {
    match serde_json::to_string(&GatewayFrame::from(event)) {
        Ok(text) => Some(WsMessage::Text(text.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode gateway frame");
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid, request_id: String) {
    let span = tracing::info_span!(
        "websocket_session",
        request_id = %request_id,
        user_id = %user_id,
        otel.kind = "server",
        ws.session_id = tracing::field::Empty
    );

    async move {
        let meter = global::meter("agora-server");
        let active_sessions = meter
            .i64_up_down_counter("agora_websocket_active_sessions")
            .with_description("Number of open WebSocket sessions")
            .build();
        let frames_sent = meter
            .u64_counter("agora_websocket_frames_sent_total")
            .with_description("Event frames written to WebSocket sessions")
            .build();
        active_sessions.add(1, &[]);

        let (connection_id, mut events) = state.notification_service.register(user_id);
        tracing::Span::current().record("ws.session_id", tracing::field::display(connection_id));
        tracing::info!("WebSocket connected");

        let (mut ws_sink, mut ws_stream) = socket.split();
        let mut shutdown_rx = state.shutdown_rx.clone();

        loop {
            if *shutdown_rx.borrow() {
                tracing::info!("Shutdown signal received, closing WebSocket");
                let _ = ws_sink
                    .send(WsMessage::Close(Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: "Server shutting down".into(),
                    })))
                    .await;
                break;
            }

            tokio::select! {
                biased;

                res = shutdown_rx.changed() => {
                    if res.is_err() {
                        break;
                    }
                }

                msg = ws_stream.next() => {
                    match msg {
                        Some(Ok(WsMessage::Close(_))) | None => break,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "WebSocket error");
                            break;
                        }
                        // The channel is push-only; client frames are ignored.
                        Some(Ok(_)) => {}
                    }
                }

                event = events.recv() => {
                    match event {
                        Some(event) => {
                            let event_name = event.name();
                            if let Some(frame) = encode_event(event) {
                                if ws_sink.send(frame).await.is_err() {
                                    break;
                                }
                                frames_sent.add(1, &[KeyValue::new("event", event_name)]);
                            }
                        }
                        None => {
                            tracing::info!("Superseded by a newer connection");
                            let _ = ws_sink
                                .send(WsMessage::Close(Some(CloseFrame {
                                    code: close_code::NORMAL,
                                    reason: "Replaced by a newer connection".into(),
                                })))
                                .await;
                            break;
                        }
                    }
                }
            }
        }

        let _ = ws_sink.close().await;
        state.notification_service.deregister(user_id, connection_id);
        active_sessions.add(-1, &[]);
        tracing::info!("WebSocket disconnected");
    }
    .instrument(span)
    .await;
}
