//! WebSocket session lifecycle — handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ServerConfig;

use super::broadcast::EventBroadcaster;
use super::connection::ClientConnection;
use super::handler::parse_control_frame;

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection and announces the assigned client ID
/// 2. Publishes the synthetic `connect` event to interested peers
/// 3. Applies inbound `subscriptions` control frames to the registry
/// 4. Forwards broadcast deliveries and periodic Ping frames outbound
/// 5. On disconnect, purges the interest set and publishes `disconnect`
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    client_id: String,
    config: ServerConfig,
    broadcast: Arc<EventBroadcaster>,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.send_channel_capacity);
    let connection = Arc::new(ClientConnection::new(client_id.clone(), send_tx));

    let connection_start = std::time::Instant::now();
    info!(client_id, "client connected");
    counter!("ws_connections_total").increment(1);
    gauge!("ws_connections_active").increment(1.0);

    broadcast.add(connection.clone()).await;

    // Announce the transport-assigned ID so the client can tag its messages
    let greeting = serde_json::json!({
        "event": "connected",
        "data": { "clientId": client_id },
    });
    if let Ok(json) = serde_json::to_string(&greeting) {
        let _ = ws_tx.send(Message::Text(json.into())).await;
    }

    let _ = broadcast.publish_connect(&client_id).await;

    // Outbound forwarder with periodic Ping frames
    let ping_interval = Duration::from_secs(config.heartbeat_interval_secs);
    let pong_timeout = Duration::from_secs(config.heartbeat_timeout_secs);
    let outbound_conn = connection.clone();
    let outbound = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        // Skip the immediate first tick
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!("client unresponsive for {pong_timeout:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Inbound loop; server shutdown ends the session like a client close
    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => match msg {
                Some(Ok(msg)) => msg,
                Some(Err(_)) | None => break,
            },
            () = shutdown.cancelled() => {
                info!(client_id, "closing session for shutdown");
                break;
            }
        };

        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(s) => Some(s.to_owned()),
                Err(_) => {
                    info!(client_id, len = data.len(), "received non-UTF8 binary frame");
                    None
                }
            },
            Message::Close(_) => {
                info!(client_id, "client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };

        let Some(text) = text else { continue };

        if let Some(frame) = parse_control_frame(&text) {
            debug!(
                client_id,
                is_subscribe = frame.is_subscribe,
                "control frame received"
            );
            broadcast.apply_control(&client_id, &frame);
        }
    }

    // Clean up: interest drops as a unit, then peers learn about the departure
    info!(client_id, "client disconnected");
    counter!("ws_disconnections_total").increment(1);
    gauge!("ws_connections_active").decrement(1.0);
    histogram!("ws_connection_duration_seconds").record(connection_start.elapsed().as_secs_f64());
    outbound.abort();
    broadcast.remove(&client_id).await;
    let _ = broadcast.publish_disconnect(&client_id).await;
}
