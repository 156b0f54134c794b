//! Client ↔ server end-to-end tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;

use pulse_client::{ClientConfig, SocketClient};
use pulse_core::EventFrame;
use pulse_server::config::ServerConfig;
use pulse_server::server::PulseServer;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn boot_server(port: u16) -> (std::net::SocketAddr, Arc<PulseServer>, JoinHandle<()>) {
    let config = ServerConfig {
        port,
        ..ServerConfig::default()
    };
    let server = Arc::new(PulseServer::new(config));
    let (addr, handle) = server.listen().await.unwrap();
    (addr, server, handle)
}

fn client_for(addr: std::net::SocketAddr) -> SocketClient {
    SocketClient::connect(ClientConfig {
        url: format!("ws://{addr}/ws"),
        retry_interval: Duration::from_millis(100),
        max_retries: 50,
        ..ClientConfig::default()
    })
}

/// Poll for `cond`. Usable under a paused clock, where a timeout around a
/// watch would fire the moment the runtime goes idle on real I/O.
async fn wait_until<F: Fn() -> bool>(cond: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(600);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition never met");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_connected(client: &SocketClient, want: bool) {
    let mut watch = client.watch_connected();
    let _ = timeout(TIMEOUT, watch.wait_for(|c| *c == want))
        .await
        .expect("timeout waiting for connection state")
        .expect("stats gone");
}

/// Poll until the server sees interest in `event_type` (or none, if
/// `want` is false).
async fn wait_server_interest(server: &PulseServer, event_type: &str, want: bool) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        let interested = !server.broadcast().registry().interested(event_type).is_empty();
        if interested == want {
            return;
        }
        assert!(tokio::time::Instant::now() < deadline, "interest never settled");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn e2e_subscribe_publish_receive() {
    let (addr, server, _handle) = boot_server(0).await;
    let client = client_for(addr);
    wait_connected(&client, true).await;

    let mut stream = client.subscribe("message").await.unwrap();
    wait_server_interest(&server, "message", true).await;

    let sent = server
        .broadcast()
        .publish(&EventFrame::new("message", serde_json::json!({"n": 1})))
        .await;
    assert_eq!(sent, 1);

    let frame = timeout(TIMEOUT, stream.recv()).await.unwrap().unwrap();
    assert_eq!(frame.event_type, "message");
    assert_eq!(frame.body["n"], 1);
    assert!(client.stats().messages_received() >= 1);

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_greeting_records_client_id() {
    let (addr, server, _handle) = boot_server(0).await;
    let client = client_for(addr);
    wait_connected(&client, true).await;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while client.stats().client_id().is_none() {
        assert!(tokio::time::Instant::now() < deadline, "greeting never arrived");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(client.stats().client_id().unwrap().starts_with("conn_"));

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_drop_stream_withdraws_server_interest() {
    let (addr, server, _handle) = boot_server(0).await;
    let client = client_for(addr);
    wait_connected(&client, true).await;

    let stream = client.subscribe("message").await.unwrap();
    wait_server_interest(&server, "message", true).await;

    drop(stream);
    wait_server_interest(&server, "message", false).await;

    let sent = server
        .broadcast()
        .publish(&EventFrame::new("message", serde_json::json!("gone")))
        .await;
    assert_eq!(sent, 0);

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_shared_type_unsubscribes_only_on_last_drop() {
    let (addr, server, _handle) = boot_server(0).await;
    let client = client_for(addr);
    wait_connected(&client, true).await;

    let mut first = client.subscribe("message").await.unwrap();
    let mut second = client.subscribe("message").await.unwrap();
    wait_server_interest(&server, "message", true).await;

    let _ = server
        .broadcast()
        .publish(&EventFrame::new("message", serde_json::json!("both")))
        .await;
    assert_eq!(
        timeout(TIMEOUT, first.recv()).await.unwrap().unwrap().body,
        "both"
    );
    assert_eq!(
        timeout(TIMEOUT, second.recv()).await.unwrap().unwrap().body,
        "both"
    );

    // One of two consumers leaving keeps the server subscription
    first.close().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    wait_server_interest(&server, "message", true).await;

    second.close().await.unwrap();
    wait_server_interest(&server, "message", false).await;

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_reconnects_after_server_restart() {
    let (addr, server, handle) = boot_server(0).await;
    let client = client_for(addr);
    wait_connected(&client, true).await;
    let mut connects = client.watch_connections();
    assert_eq!(*connects.borrow_and_update(), 1);

    let _stream = client.subscribe("message").await.unwrap();
    wait_server_interest(&server, "message", true).await;

    // Take the server down; the client notices and starts retrying
    server.shutdown().shutdown();
    handle.await.unwrap();
    wait_connected(&client, false).await;

    // Bring a fresh server up on the same port; the connection counter
    // announces the reconnect
    let (_, server2, _handle2) = boot_server(addr.port()).await;
    let _ = timeout(TIMEOUT, connects.wait_for(|n| *n >= 2))
        .await
        .expect("timeout waiting for reconnect")
        .expect("stats gone");
    assert_eq!(client.stats().connections(), 2);

    // Server-side interest is gone; the caller restores it
    client.resubscribe_active().await.unwrap();
    wait_server_interest(&server2, "message", true).await;

    server2.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_disconnect_reconnects_automatically() {
    let (addr, server, _handle) = boot_server(0).await;
    let client = client_for(addr);
    wait_connected(&client, true).await;

    client.disconnect().await.unwrap();
    wait_connected(&client, false).await;

    // No explicit reconnect: the task takes the usual close path and
    // comes back on its own after the retry interval
    wait_connected(&client, true).await;
    assert!(client.stats().connections() >= 2);

    server.shutdown().shutdown();
}

#[tokio::test(start_paused = true)]
async fn e2e_retry_after_drop_waits_one_interval() {
    let (addr, server, handle) = boot_server(0).await;
    let client = SocketClient::connect(ClientConfig {
        url: format!("ws://{addr}/ws"),
        retry_interval: Duration::from_secs(5),
        max_retries: 30,
        ..ClientConfig::default()
    });
    wait_until(|| client.is_connected()).await;

    let lost_at = tokio::time::Instant::now();
    server.shutdown().shutdown();
    handle.await.unwrap();
    wait_until(|| client.stats().reconnection_tries() >= 1).await;

    // The first attempt after a drop comes a full interval later, not
    // immediately
    assert!(lost_at.elapsed() >= Duration::from_secs(5));
}

#[tokio::test]
async fn e2e_one_stream_covers_multiple_types() {
    let (addr, server, _handle) = boot_server(0).await;
    let client = client_for(addr);
    wait_connected(&client, true).await;

    let mut stream = client.subscribe(["connect", "disconnect"]).await.unwrap();
    wait_server_interest(&server, "connect", true).await;
    wait_server_interest(&server, "disconnect", true).await;

    // A peer coming and going shows up as both lifecycle events on the
    // one stream
    let peer = client_for(addr);
    wait_connected(&peer, true).await;
    let frame = timeout(TIMEOUT, stream.recv()).await.unwrap().unwrap();
    assert_eq!(frame.event_type, "connect");

    drop(peer);
    let frame = timeout(TIMEOUT, stream.recv()).await.unwrap().unwrap();
    assert_eq!(frame.event_type, "disconnect");

    // Closing the stream withdraws interest in every type of the set
    stream.close().await.unwrap();
    wait_server_interest(&server, "connect", false).await;
    wait_server_interest(&server, "disconnect", false).await;

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_subscribe_before_connect_drains_on_connect() {
    // Pick the port first, subscribe while nothing is listening
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let client = client_for(addr);
    let mut stream = client.subscribe("message").await.unwrap();
    assert!(!client.is_connected());

    let (_, server, _handle) = boot_server(addr.port()).await;
    wait_connected(&client, true).await;

    // The queued subscribe frame went out on connect
    wait_server_interest(&server, "message", true).await;
    let sent = server
        .broadcast()
        .publish(&EventFrame::new("message", serde_json::json!("late")))
        .await;
    assert_eq!(sent, 1);
    assert_eq!(
        timeout(TIMEOUT, stream.recv()).await.unwrap().unwrap().body,
        "late"
    );

    server.shutdown().shutdown();
}
