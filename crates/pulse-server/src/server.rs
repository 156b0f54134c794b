//! `PulseServer` — axum HTTP + WebSocket gateway.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::{Json, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use pulse_core::protocol::event_types;
use pulse_core::EventFrame;

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::EventBroadcaster;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcaster for event fan-out.
    pub broadcast: Arc<EventBroadcaster>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Server configuration (heartbeat parameters for sessions).
    pub config: ServerConfig,
}

/// The Pulse gateway server.
pub struct PulseServer {
    config: ServerConfig,
    broadcast: Arc<EventBroadcaster>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl PulseServer {
    /// Create a new server.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            broadcast: Arc::new(EventBroadcaster::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            broadcast: self.broadcast.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            config: self.config.clone(),
        };

        Router::new()
            .route("/api/hello", get(hello_handler))
            .route("/api/message", post(post_message_handler))
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port 0) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "gateway listening");

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                tracing::error!(error = %e, "serve loop exited with error");
            }
        });

        Ok((addr, handle))
    }

    /// Get the broadcaster.
    pub fn broadcast(&self) -> &Arc<EventBroadcaster> {
        &self.broadcast
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /api/hello
async fn hello_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Hello from the API" }))
}

/// Body of POST /api/message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostMessage {
    /// The chat message text.
    message: String,
    /// Sending client's ID, if it has one yet.
    #[serde(default)]
    client_id: Option<String>,
}

/// POST /api/message — publish a chat message to interested clients.
async fn post_message_handler(
    State(state): State<AppState>,
    Json(body): Json<PostMessage>,
) -> Json<serde_json::Value> {
    let event = EventFrame::new(
        event_types::MESSAGE,
        serde_json::json!({
            "clientId": body.client_id,
            "message": body.message,
            "sentAt": chrono::Utc::now().to_rfc3339(),
        }),
    );
    let recipients = state.broadcast.publish(&event).await;
    Json(serde_json::json!({ "recipients": recipients }))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.broadcast.connection_count();
    Json(health::health_check(state.start_time, connections))
}

/// GET /ws — upgrade to a WebSocket session.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let client_id = format!("conn_{}", Uuid::now_v7().simple());
    let token = state.shutdown.token();
    ws.on_upgrade(move |socket| {
        run_ws_session(socket, client_id, state.config.clone(), state.broadcast, token)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn make_server() -> PulseServer {
        PulseServer::new(ServerConfig::default())
    }

    #[tokio::test]
    async fn hello_endpoint_returns_greeting() {
        let app = make_server().router();
        let req = Request::builder()
            .uri("/api/hello")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["message"], "Hello from the API");
    }

    #[tokio::test]
    async fn health_endpoint_reports_connections() {
        let app = make_server().router();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
    }

    #[tokio::test]
    async fn post_message_with_no_subscribers_reaches_nobody() {
        let app = make_server().router();
        let req = Request::builder()
            .method("POST")
            .uri("/api/message")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"message":"hi"}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["recipients"], 0);
    }

    #[tokio::test]
    async fn post_message_rejects_bad_body() {
        let app = make_server().router();
        let req = Request::builder()
            .method("POST")
            .uri("/api/message")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"text":"wrong field"}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = make_server().router();
        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_binds_auto_assigned_port() {
        let server = make_server();
        let (addr, _handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        server.shutdown().shutdown();
    }

    #[test]
    fn shutdown_accessible() {
        let server = make_server();
        assert!(!server.shutdown().is_shutting_down());
        server.shutdown().shutdown();
        assert!(server.shutdown().is_shutting_down());
    }

    #[test]
    fn config_accessible() {
        let server = make_server();
        assert_eq!(server.config().host, "127.0.0.1");
    }
}
