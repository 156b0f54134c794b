//! Background connection task.
//!
//! One task owns the WebSocket stream, the subscription ref-counts, the
//! outbound control queue and the demultiplexing table. Handles talk to
//! it over a command channel, which also makes retry scheduling single-
//! flight: there is exactly one place a reconnect can start from.

use std::collections::HashMap;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use pulse_core::{ControlFrame, EventFrame, WsEnvelope};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::counts::SubscriptionCounts;
use crate::errors::ClientError;
use crate::queue::ControlQueue;
use crate::stats::SocketStats;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Requests from [`crate::SocketClient`] handles to the connection task.
pub(crate) enum Command {
    /// Add a subscriber covering a set of event types; replies with the
    /// delivery channel. Each type is ref-counted individually.
    Subscribe {
        event_types: Vec<String>,
        reply: oneshot::Sender<mpsc::Receiver<EventFrame>>,
    },
    /// Remove a subscriber. `reply` is `None` for fire-and-forget drops.
    Unsubscribe {
        event_types: Vec<String>,
        reply: Option<oneshot::Sender<Result<(), ClientError>>>,
    },
    /// Re-send subscribe frames for every active event type.
    Resubscribe { reply: oneshot::Sender<()> },
    /// Close the current connection. Reconnection is automatic.
    Disconnect { reply: oneshot::Sender<()> },
    /// Start connecting immediately, resetting the retry budget.
    Reconnect,
}

/// Where the task goes after the current phase ends.
enum Next {
    /// Attempt a connection right away (startup, explicit reconnect).
    Connect,
    /// Wait one retry interval first (a live connection just closed).
    Retry,
    /// Sit idle until an explicit `Reconnect`.
    Idle,
    /// All handles dropped; stop.
    Shutdown,
}

pub(crate) struct ConnectionTask {
    config: ClientConfig,
    stats: Arc<SocketStats>,
    cmd_rx: mpsc::Receiver<Command>,
    counts: SubscriptionCounts,
    queue: ControlQueue,
    subscribers: HashMap<String, Vec<mpsc::Sender<EventFrame>>>,
}

impl ConnectionTask {
    pub(crate) fn new(
        config: ClientConfig,
        stats: Arc<SocketStats>,
        cmd_rx: mpsc::Receiver<Command>,
    ) -> Self {
        Self {
            config,
            stats,
            cmd_rx,
            counts: SubscriptionCounts::new(),
            queue: ControlQueue::new(),
            subscribers: HashMap::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        let mut next = Next::Connect;
        loop {
            next = match next {
                Next::Connect => self.connect_loop(false).await,
                Next::Retry => self.connect_loop(true).await,
                Next::Idle => self.idle_loop().await,
                Next::Shutdown => break,
            };
        }
        debug!("connection task stopped");
    }

    /// Try to connect until the budget runs out, waiting one retry interval
    /// ahead of each attempt after the first. `wait_first` delays the first
    /// attempt too, for rounds entered because a live connection closed. A
    /// success hands off to the connected loop with a fresh budget.
    async fn connect_loop(&mut self, mut wait_first: bool) -> Next {
        let mut attempts: u32 = 0;
        loop {
            if wait_first {
                if let Some(next) = self
                    .sleep_serving_commands(self.config.retry_interval)
                    .await
                {
                    return next;
                }
            }
            wait_first = true;
            debug!(url = %self.config.url, "connecting");
            match connect_async(self.config.url.as_str()).await {
                Ok((ws, _)) => {
                    self.stats.clear_error();
                    self.stats.record_connection();
                    info!(url = %self.config.url, "connected");
                    return self.connected_loop(ws).await;
                }
                Err(e) => {
                    attempts += 1;
                    self.stats.record_retry();
                    let error = ClientError::WebSocket(e);
                    self.stats.record_error(error.to_string());
                    if attempts >= self.config.max_retries {
                        let exhausted = ClientError::RetriesExhausted { attempts };
                        error!(
                            error = %exhausted,
                            "an explicit reconnect starts a fresh round"
                        );
                        self.stats.record_error(exhausted.to_string());
                        return Next::Idle;
                    }
                    warn!(
                        attempt = attempts,
                        max = self.config.max_retries,
                        error = %error,
                        "connect failed, retrying"
                    );
                }
            }
        }
    }

    /// Serve the connection until it drops or a command ends it.
    async fn connected_loop(&mut self, mut ws: WsStream) -> Next {
        self.stats.set_connected(true);

        // Frames queued while offline go out first, oldest first
        if let Err(e) = self.drain_queue(&mut ws).await {
            return self.lost(&e.to_string());
        }

        loop {
            tokio::select! {
                msg = ws.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()),
                    Some(Ok(Message::Ping(payload))) => {
                        if ws.send(Message::Pong(payload)).await.is_err() {
                            return self.lost("connection lost during pong");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return self.lost("connection closed by server");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return self.lost(&e.to_string());
                    }
                },
                cmd = self.cmd_rx.recv() => match cmd {
                    None => {
                        let _ = ws.close(None).await;
                        self.stats.set_connected(false);
                        return Next::Shutdown;
                    }
                    Some(Command::Disconnect { reply }) => {
                        let _ = ws.close(None).await;
                        self.stats.set_connected(false);
                        self.stats.set_client_id(None);
                        let _ = reply.send(());
                        info!("disconnected on request, reconnecting");
                        return Next::Retry;
                    }
                    Some(Command::Reconnect) => {
                        // Already connected
                    }
                    Some(cmd) => {
                        self.apply_command(cmd);
                        if let Err(e) = self.drain_queue(&mut ws).await {
                            return self.lost(&e.to_string());
                        }
                    }
                },
            }
        }
    }

    /// Sit still after an exhausted retry budget. Bookkeeping commands
    /// still apply; the queue keeps accumulating.
    async fn idle_loop(&mut self) -> Next {
        loop {
            match self.cmd_rx.recv().await {
                None => return Next::Shutdown,
                Some(Command::Reconnect) => return Next::Connect,
                Some(Command::Disconnect { reply }) => {
                    // Already disconnected
                    let _ = reply.send(());
                }
                Some(cmd) => self.apply_command(cmd),
            }
        }
    }

    /// Wait out the retry interval while still serving commands.
    async fn sleep_serving_commands(&mut self, dur: std::time::Duration) -> Option<Next> {
        let sleep = tokio::time::sleep(dur);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = &mut sleep => return None,
                cmd = self.cmd_rx.recv() => match cmd {
                    None => return Some(Next::Shutdown),
                    Some(Command::Reconnect) => return Some(Next::Connect),
                    Some(Command::Disconnect { reply }) => {
                        // Already disconnected; the retry round carries on
                        let _ = reply.send(());
                    }
                    Some(cmd) => self.apply_command(cmd),
                },
            }
        }
    }

    /// Mark the connection lost and head back into the retry loop.
    fn lost(&mut self, reason: &str) -> Next {
        warn!(reason, "connection lost, reconnecting");
        self.stats.set_connected(false);
        self.stats.set_client_id(None);
        self.stats.record_error(reason.to_owned());
        Next::Retry
    }

    /// Apply a bookkeeping command. Valid in every phase; wire traffic it
    /// generates lands in the queue and drains when a connection is up.
    fn apply_command(&mut self, cmd: Command) {
        match cmd {
            Command::Subscribe { event_types, reply } => {
                let (tx, rx) = mpsc::channel(self.config.event_channel_capacity);
                for event_type in &event_types {
                    self.subscribers
                        .entry(event_type.clone())
                        .or_default()
                        .push(tx.clone());
                    if self.counts.increment(event_type) {
                        debug!(
                            event_type = %event_type,
                            "first local subscriber, queueing subscribe"
                        );
                        self.queue.push(ControlFrame::subscribe(event_type));
                    }
                }
                self.stats.set_subscription_count(self.counts.active_len());
                let _ = reply.send(rx);
            }
            Command::Unsubscribe { event_types, reply } => {
                let mut result = Ok(());
                for event_type in &event_types {
                    match self.counts.decrement(event_type) {
                        Ok(true) => {
                            debug!(
                                event_type = %event_type,
                                "last local subscriber gone, queueing unsubscribe"
                            );
                            self.queue.push(ControlFrame::unsubscribe(event_type));
                        }
                        Ok(false) => {}
                        Err(e) => {
                            error!(
                                event_type = %event_type,
                                "unsubscribe without a matching subscribe"
                            );
                            if result.is_ok() {
                                result = Err(e);
                            }
                        }
                    }
                }
                self.stats.set_subscription_count(self.counts.active_len());
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Command::Resubscribe { reply } => {
                for event_type in self.counts.active_types() {
                    self.queue.push(ControlFrame::subscribe(event_type));
                }
                let _ = reply.send(());
            }
            Command::Disconnect { .. } | Command::Reconnect => {
                // Phase transitions, handled by the phase loops
            }
        }
    }

    /// Send queued control frames, oldest first. A frame leaves the queue
    /// only after its send succeeds.
    async fn drain_queue(
        &mut self,
        ws: &mut WsStream,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        while let Some(frame) = self.queue.front() {
            let json = match encode_control(frame) {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "dropping unencodable control frame");
                    self.queue.ack_front();
                    continue;
                }
            };
            ws.send(Message::text(json)).await?;
            self.queue.ack_front();
        }
        Ok(())
    }

    /// Route an inbound text frame.
    fn dispatch(&mut self, text: &str) {
        if let Some(frame) = EventFrame::parse(text) {
            self.stats.record_message();
            let Some(senders) = self.subscribers.get_mut(&frame.event_type) else {
                debug!(event_type = %frame.event_type, "event with no local subscribers");
                return;
            };
            senders.retain(|tx| match tx.try_send(frame.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(event_type = %frame.event_type, "subscriber lagging, dropping event");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            });
            if senders.is_empty() {
                let _ = self.subscribers.remove(&frame.event_type);
            }
            return;
        }

        // Not an event frame: maybe the connection greeting
        if let Ok(envelope) = serde_json::from_str::<WsEnvelope>(text) {
            if envelope.event == "connected" {
                if let Some(id) = envelope.data.get("clientId").and_then(|v| v.as_str()) {
                    info!(client_id = id, "server assigned client id");
                    self.stats.set_client_id(Some(id.to_owned()));
                    return;
                }
            }
            debug!(event = %envelope.event, "ignoring envelope");
        } else {
            debug!("ignoring unrecognized frame");
        }
    }
}

/// Serialize a control frame into its wire envelope.
fn encode_control(frame: &ControlFrame) -> Result<String, pulse_core::ProtocolError> {
    let envelope = WsEnvelope::subscriptions(frame)?;
    Ok(serde_json::to_string(&envelope)?)
}
