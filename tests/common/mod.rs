//! Shared test utilities.
//!
//! Provides a scripted local WebSocket server and logging setup.
//!
//! The server answers each request according to its `type`:
//!
//! | Type | Reply |
//! |------|-------|
//! | `getToken` | `{"id", "payload": {"token": "xyz"}}` |
//! | `echo` | `{"id", "payload": <request payload>}` |
//! | `fail` | `{"id", "error": <request payload as string>}` |
//! | `empty` | `{"id"}` |
//! | `delay` | `{"id", "payload": payload.value}` after `payload.ms` milliseconds |
//! | `silent` | nothing |
//! | `drop` | closes the connection |
//! | `noisy` | a push without id, an undecodable frame, then an echo |
//! | `duplicate` | the echo twice |

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing_subscriber::EnvFilter;

use tether_ws::{Client, ConnectionState};

// ============================================================================
// Logging
// ============================================================================

/// Initialize tracing for tests; honours `RUST_LOG`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tether_ws=debug")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MockServer
// ============================================================================

/// Scripted WebSocket server on `127.0.0.1`.
pub struct MockServer {
    port: u16,
    accepted: Arc<AtomicUsize>,
    frames: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    /// Binds to a random port and starts accepting.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let frames = Arc::new(Mutex::new(Vec::new()));

        let accepted_clone = Arc::clone(&accepted);
        let frames_clone = Arc::clone(&frames);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accepted_clone.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, Arc::clone(&frames_clone)));
            }
        });

        Self {
            port,
            accepted,
            frames,
        }
    }

    /// WebSocket URL of this server.
    pub fn endpoint(&self) -> String {
        format!("ws://127.0.0.1:{}/rpc", self.port)
    }

    /// Number of connections accepted so far.
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Raw request frames received so far, in arrival order.
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    /// Client for this server with a short request timeout.
    pub fn client(&self) -> Client {
        Client::builder()
            .endpoint(self.endpoint())
            .request_timeout(Duration::from_secs(5))
            .build()
            .expect("valid config")
    }
}

/// Serves one connection until either side closes.
async fn serve(stream: TcpStream, frames: Arc<Mutex<Vec<String>>>) {
    let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if write.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(Ok(message)) = read.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        frames.lock().push(text.as_str().to_owned());

        let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        let id = request["id"].clone();
        let payload = request["payload"].clone();
        let send = |value: Value| {
            let _ = out_tx.send(Message::Text(value.to_string().into()));
        };

        match request["type"].as_str().unwrap_or_default() {
            "getToken" => send(json!({"id": id, "payload": {"token": "xyz"}})),
            "echo" => send(json!({"id": id, "payload": payload})),
            "fail" => send(json!({"id": id, "error": payload.as_str().unwrap_or("failed")})),
            "empty" => send(json!({"id": id})),
            "delay" => {
                let ms = payload["ms"].as_u64().unwrap_or(0);
                let value = payload["value"].clone();
                let out_tx = out_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    let reply = json!({"id": id, "payload": value});
                    let _ = out_tx.send(Message::Text(reply.to_string().into()));
                });
            }
            "silent" => {}
            "drop" => {
                let _ = out_tx.send(Message::Close(None));
                break;
            }
            "noisy" => {
                let _ = out_tx.send(Message::Text(String::from(r#"{"payload":"push"}"#).into()));
                let _ = out_tx.send(Message::Text(String::from("not json").into()));
                send(json!({"id": id, "payload": payload}));
            }
            "duplicate" => {
                send(json!({"id": id, "payload": payload}));
                send(json!({"id": id, "payload": "second"}));
            }
            _ => send(json!({"id": id, "error": "unknown type"})),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Polls until the client reaches `state`, panicking after 5 seconds.
pub async fn wait_for_state(client: &Client, state: ConnectionState) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while client.state() != state {
        assert!(
            tokio::time::Instant::now() < deadline,
            "client stuck in {} waiting for {state}",
            client.state()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
