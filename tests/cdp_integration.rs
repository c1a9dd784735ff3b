//! Integration tests for the CDP WebSocket client.
//!
//! Each test spins up a mock WebSocket server with configurable behavior,
//! connects a `CdpClient`, and verifies the expected interactions.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pagedump::cdp::{CdpClient, CdpConfig, CdpError};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

// =============================================================================
// Mock server helpers
// =============================================================================

/// Start a mock CDP server that echoes `{"id": N, "result": {}}` for each command.
async fn start_echo_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                while let Some(Ok(msg)) = source.next().await {
                    if let Message::Text(text) = msg {
                        let cmd: Value = serde_json::from_str(&text).unwrap();
                        let response = json!({"id": cmd["id"], "result": {}});
                        sink.send(Message::Text(response.to_string().into()))
                            .await
                            .unwrap();
                    }
                }
            });
        }
    });
    (addr, handle)
}

/// Start a mock server that responds with a custom result for each command.
async fn start_custom_result_server(
    result_fn: fn(&Value) -> Value,
) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                while let Some(Ok(msg)) = source.next().await {
                    if let Message::Text(text) = msg {
                        let cmd: Value = serde_json::from_str(&text).unwrap();
                        let result = result_fn(&cmd);
                        let response = json!({"id": cmd["id"], "result": result});
                        sink.send(Message::Text(response.to_string().into()))
                            .await
                            .unwrap();
                    }
                }
            });
        }
    });
    (addr, handle)
}

/// Start a mock server that never responds to commands (for timeout tests).
async fn start_silent_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (_sink, mut source) = ws.split();
                // Accept commands but never respond
                while source.next().await.is_some() {}
            });
        }
    });
    (addr, handle)
}

/// Start a mock server that returns a CDP protocol error for each command.
async fn start_protocol_error_server(code: i64, message: &str) -> (SocketAddr, JoinHandle<()>) {
    let message = message.to_owned();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let message = message.clone();
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                while let Some(Ok(msg)) = source.next().await {
                    if let Message::Text(text) = msg {
                        let cmd: Value = serde_json::from_str(&text).unwrap();
                        let response = json!({
                            "id": cmd["id"],
                            "error": {"code": code, "message": message}
                        });
                        sink.send(Message::Text(response.to_string().into()))
                            .await
                            .unwrap();
                    }
                }
            });
        }
    });
    (addr, handle)
}

/// Start a mock server that drops the connection after N messages.
async fn start_drop_after_server(n: usize) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                let mut count = 0;
                while let Some(Ok(msg)) = source.next().await {
                    if let Message::Text(text) = msg {
                        let cmd: Value = serde_json::from_str(&text).unwrap();
                        let response = json!({"id": cmd["id"], "result": {}});
                        sink.send(Message::Text(response.to_string().into()))
                            .await
                            .unwrap();
                        count += 1;
                        if count >= n {
                            // Close connection
                            drop(sink);
                            return;
                        }
                    }
                }
            });
        }
    });
    (addr, handle)
}

/// Start a mock server that emits events on demand via a channel.
async fn start_event_server() -> (SocketAddr, mpsc::Sender<Value>, JoinHandle<()>) {
    let (event_tx, mut event_rx) = mpsc::channel::<Value>(32);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (mut sink, mut source) = ws.split();

            loop {
                tokio::select! {
                    // Handle incoming commands (echo response)
                    msg = source.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let cmd: Value = serde_json::from_str(&text).unwrap();
                                let response = json!({"id": cmd["id"], "result": {}});
                                sink.send(Message::Text(response.to_string().into()))
                                    .await
                                    .unwrap();
                            }
                            None | Some(Err(_)) => break,
                            _ => {}
                        }
                    }
                    // Send events requested by tests
                    event = event_rx.recv() => {
                        if let Some(event) = event {
                            sink.send(Message::Text(event.to_string().into()))
                                .await
                                .unwrap();
                        } else {
                            break;
                        }
                    }
                }
            }
        }
    });
    (addr, event_tx, handle)
}

/// Start a mock server that sends malformed JSON, then continues serving normally.
async fn start_malformed_then_echo_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                let mut first = true;
                while let Some(Ok(msg)) = source.next().await {
                    if let Message::Text(text) = msg {
                        let cmd: Value = serde_json::from_str(&text).unwrap();
                        if first {
                            // Send malformed JSON first
                            sink.send(Message::Text(r"this is not json{".into()))
                                .await
                                .unwrap();
                            first = false;
                        }
                        // Then send a proper response
                        let response = json!({"id": cmd["id"], "result": {}});
                        sink.send(Message::Text(response.to_string().into()))
                            .await
                            .unwrap();
                    }
                }
            });
        }
    });
    (addr, handle)
}

fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{addr}")
}

fn quick_config() -> CdpConfig {
    CdpConfig {
        connect_timeout: Duration::from_secs(5),
        command_timeout: Duration::from_secs(5),
        channel_capacity: 256,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn connect_to_mock_server() {
    let (addr, _handle) = start_echo_server().await;
    let client = CdpClient::connect(&ws_url(addr), quick_config()).await;
    assert!(client.is_ok());
    let client = client.unwrap();
    assert!(client.is_connected());
}

#[tokio::test]
async fn send_command_and_receive_response() {
    let (addr, _handle) = start_echo_server().await;
    let client = CdpClient::connect(&ws_url(addr), quick_config())
        .await
        .unwrap();

    let result = client
        .send_command("Page.navigate", Some(json!({"url": "https://example.com"})))
        .await;

    assert!(result.is_ok());
    let value = result.unwrap();
    assert!(value.is_object());
}

#[tokio::test]
async fn concurrent_command_correlation() {
    // Server returns the command's id as a result value
    let (addr, _handle) = start_custom_result_server(|cmd| json!({"echo_id": cmd["id"]})).await;
    let client = CdpClient::connect(&ws_url(addr), quick_config())
        .await
        .unwrap();

    // Send 10 commands concurrently using join_all
    let client_ref = &client;
    let futures: Vec<_> = (0..10)
        .map(|i| async move {
            let method = format!("Test.method{i}");
            client_ref.send_command(&method, None).await
        })
        .collect();

    let results = futures_util::future::join_all(futures).await;

    // All 10 should succeed with distinct echo_ids
    let ids: std::collections::HashSet<u64> = results
        .iter()
        .map(|r| {
            let value = r.as_ref().expect("command failed");
            value["echo_id"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(ids.len(), 10, "expected 10 unique response IDs");
}

#[tokio::test]
async fn receive_cdp_events() {
    let (addr, event_tx, _handle) = start_event_server().await;
    let client = CdpClient::connect(&ws_url(addr), quick_config())
        .await
        .unwrap();

    let mut rx = client.subscribe("Network.loadingFinished").await.unwrap();

    // Server emits the event
    event_tx
        .send(json!({
            "method": "Network.loadingFinished",
            "params": {"requestId": "r1"}
        }))
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed");

    assert_eq!(event.method, "Network.loadingFinished");
    assert_eq!(event.params["requestId"], "r1");
}

#[tokio::test]
async fn event_unsubscription_on_drop() {
    let (addr, event_tx, _handle) = start_event_server().await;
    let client = CdpClient::connect(&ws_url(addr), quick_config())
        .await
        .unwrap();

    let rx = client.subscribe("Network.requestWillBeSent").await.unwrap();
    // Drop the receiver
    drop(rx);

    // Give transport time to notice the drop
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Server sends event — should not cause issues
    event_tx
        .send(json!({
            "method": "Network.requestWillBeSent",
            "params": {"requestId": "r9"}
        }))
        .await
        .unwrap();

    // Client should still be functional
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(client.is_connected());
}

#[tokio::test]
async fn connection_timeout() {
    // Connect to a port that's unlikely to be listening, with a very short timeout
    let config = CdpConfig {
        connect_timeout: Duration::from_secs(1),
        command_timeout: Duration::from_secs(1),
        channel_capacity: 16,
    };

    let start = std::time::Instant::now();
    let result = CdpClient::connect("ws://192.0.2.1:9999", config).await;
    let elapsed = start.elapsed();

    assert!(result.is_err());
    assert!(
        elapsed < Duration::from_secs(3),
        "should timeout quickly, took {elapsed:?}"
    );

    match result {
        Err(CdpError::ConnectionTimeout | CdpError::Connection(_)) => {}
        Err(other) => panic!("expected ConnectionTimeout or Connection, got: {other}"),
        Ok(_) => panic!("expected connection error, but connection succeeded"),
    }
}

#[tokio::test]
async fn command_timeout() {
    let (addr, _handle) = start_silent_server().await;
    let config = CdpConfig {
        connect_timeout: Duration::from_secs(5),
        command_timeout: Duration::from_secs(1),
        channel_capacity: 256,
    };
    let client = CdpClient::connect(&ws_url(addr), config).await.unwrap();

    let result = client.send_command("Slow.method", None).await;
    assert!(result.is_err());
    let err = result.unwrap_err();
    assert!(
        matches!(err, CdpError::CommandTimeout { .. }),
        "expected CommandTimeout, got: {err}"
    );
}

#[tokio::test]
async fn websocket_close_handling() {
    // Server drops connection after 1 message
    let (addr, _handle) = start_drop_after_server(1).await;
    let config = CdpConfig {
        connect_timeout: Duration::from_secs(5),
        command_timeout: Duration::from_secs(2),
        channel_capacity: 256,
    };
    let client = CdpClient::connect(&ws_url(addr), config).await.unwrap();

    // First command succeeds (server responds then drops)
    let r1 = client.send_command("First.command", None).await;
    assert!(r1.is_ok());

    // Give transport time to notice the close
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Client should report disconnected
    assert!(
        !client.is_connected(),
        "client should report disconnected after server drops"
    );
}

#[tokio::test]
async fn commands_after_disconnect_fail_closed() {
    let (addr, _handle) = start_drop_after_server(1).await;
    let config = CdpConfig {
        connect_timeout: Duration::from_secs(5),
        command_timeout: Duration::from_secs(2),
        channel_capacity: 256,
    };
    let client = CdpClient::connect(&ws_url(addr), config).await.unwrap();

    let _ = client.send_command("First.command", None).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // No reconnection: the socket is gone for good, commands fail fast
    let result = client.send_command("Second.command", None).await;
    let err = result.unwrap_err();
    assert!(
        matches!(err, CdpError::ConnectionClosed | CdpError::Connection(_)),
        "expected ConnectionClosed, got: {err}"
    );
}

#[tokio::test]
async fn protocol_error_handling() {
    let (addr, _handle) = start_protocol_error_server(-32000, "Cannot navigate to invalid URL").await;
    let client = CdpClient::connect(&ws_url(addr), quick_config())
        .await
        .unwrap();

    let result = client.send_command("Page.navigate", None).await;
    assert!(result.is_err());

    let err = result.unwrap_err();
    match err {
        CdpError::Protocol { code, message } => {
            assert_eq!(code, -32000);
            assert_eq!(message, "Cannot navigate to invalid URL");
        }
        other => panic!("expected Protocol error, got: {other}"),
    }
}

#[tokio::test]
async fn invalid_json_handling() {
    let (addr, _handle) = start_malformed_then_echo_server().await;
    let client = CdpClient::connect(&ws_url(addr), quick_config())
        .await
        .unwrap();

    // First command triggers malformed JSON, but should still get a response
    let result = client.send_command("Test.first", None).await;
    assert!(
        result.is_ok(),
        "client should handle malformed JSON gracefully"
    );

    // Second command should work normally
    let result = client.send_command("Test.second", None).await;
    assert!(result.is_ok(), "subsequent commands should still work");
}

#[tokio::test]
async fn close_shuts_down_cleanly() {
    let (addr, _handle) = start_echo_server().await;
    let client = CdpClient::connect(&ws_url(addr), quick_config())
        .await
        .unwrap();

    assert_eq!(client.url(), ws_url(addr));
    let result = client.close().await;
    assert!(result.is_ok());
}
