//! Public socket handle and subscription streams.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use pulse_core::{EventFrame, EventTypes};
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::stats::SocketStats;
use crate::task::{Command, ConnectionTask};

/// Capacity of the handle → task command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Handle to a reconnecting WebSocket connection.
///
/// Cloning is cheap; all clones talk to the same background connection
/// task. The connection opens eagerly and keeps itself alive through
/// disconnects until every handle is dropped.
#[derive(Clone)]
pub struct SocketClient {
    cmd_tx: mpsc::Sender<Command>,
    stats: Arc<SocketStats>,
}

impl SocketClient {
    /// Spawn the connection task and start connecting.
    pub fn connect(config: ClientConfig) -> Self {
        let stats = Arc::new(SocketStats::new());
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let task = ConnectionTask::new(config, stats.clone(), cmd_rx);
        drop(tokio::spawn(task.run()));
        Self { cmd_tx, stats }
    }

    /// Subscribe to one event type or a set of them in a single call.
    ///
    /// The returned stream yields every frame whose type is in the set.
    /// Each type is ref-counted individually: the first local subscriber
    /// for a type sends a subscribe frame to the server, further
    /// subscribers share it. Works while offline: frames wait in the
    /// outbound queue until a connection is up.
    pub async fn subscribe(
        &self,
        event_types: impl Into<EventTypes>,
    ) -> Result<EventStream, ClientError> {
        let event_types = event_types.into().as_slice().to_vec();
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Subscribe {
                event_types: event_types.clone(),
                reply: tx,
            })
            .await
            .map_err(|_| ClientError::TaskGone)?;
        let events = rx.await.map_err(|_| ClientError::TaskGone)?;
        Ok(EventStream {
            event_types,
            events,
            cmd_tx: self.cmd_tx.clone(),
            closed: false,
        })
    }

    /// Re-send subscribe frames for every event type that has local
    /// subscribers. Callers that keep streams across a reconnect use
    /// this to restore their server-side interest.
    pub async fn resubscribe_active(&self) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Resubscribe { reply: tx })
            .await
            .map_err(|_| ClientError::TaskGone)?;
        rx.await.map_err(|_| ClientError::TaskGone)
    }

    /// Close the current connection. The task takes the usual close path
    /// and reconnects after one retry interval; subscription bookkeeping
    /// survives throughout.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Disconnect { reply: tx })
            .await
            .map_err(|_| ClientError::TaskGone)?;
        rx.await.map_err(|_| ClientError::TaskGone)
    }

    /// Start connecting again with a fresh retry budget. Also the way out
    /// of an exhausted retry loop.
    pub async fn reconnect(&self) -> Result<(), ClientError> {
        self.cmd_tx
            .send(Command::Reconnect)
            .await
            .map_err(|_| ClientError::TaskGone)
    }

    /// Live socket statistics.
    pub fn stats(&self) -> &SocketStats {
        &self.stats
    }

    /// Whether the socket is currently connected.
    pub fn is_connected(&self) -> bool {
        self.stats.is_connected()
    }

    /// Watch connection status transitions.
    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.stats.watch_connected()
    }

    /// Watch the connection counter; see [`SocketStats::watch_connections`].
    pub fn watch_connections(&self) -> watch::Receiver<u64> {
        self.stats.watch_connections()
    }
}

/// A live subscription to a set of event types.
///
/// Dropping the stream unsubscribes every type fire-and-forget;
/// [`EventStream::close`] does the same but surfaces bookkeeping errors.
pub struct EventStream {
    event_types: Vec<String>,
    events: mpsc::Receiver<EventFrame>,
    cmd_tx: mpsc::Sender<Command>,
    closed: bool,
}

impl EventStream {
    /// The event types this stream delivers.
    pub fn event_types(&self) -> &[String] {
        &self.event_types
    }

    /// Receive the next event. `None` once the connection task is gone.
    pub async fn recv(&mut self) -> Option<EventFrame> {
        self.events.recv().await
    }

    /// Unsubscribe explicitly, surfacing ref-count errors.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.closed = true;
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Unsubscribe {
                event_types: self.event_types.clone(),
                reply: Some(tx),
            })
            .await
            .map_err(|_| ClientError::TaskGone)?;
        rx.await.map_err(|_| ClientError::TaskGone)?
    }
}

impl futures::Stream for EventStream {
    type Item = EventFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let cmd = Command::Unsubscribe {
            event_types: std::mem::take(&mut self.event_types),
            reply: None,
        };
        if self.cmd_tx.try_send(cmd).is_err() {
            tracing::debug!("unsubscribe on drop not delivered, connection task gone");
        }
    }
}
