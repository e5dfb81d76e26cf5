//! Mock upstream push server for integration tests.
//!
//! Provides a simple WebSocket server that can:
//! - Accept connections
//! - Acknowledge subscribe requests with sequential subscription ids
//! - Record received messages
//! - Push raw frames to every connected client
//! - Drop every connection without a Close frame

use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Debug, Clone)]
enum ServerCommand {
    Push(String),
    Kick,
}

/// A mock upstream feed server for testing.
pub struct MockFeedServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    command_tx: broadcast::Sender<ServerCommand>,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
}

impl MockFeedServer {
    /// Start a new mock server on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let connections: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));
        let subscription_seq: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (command_tx, _) = broadcast::channel::<ServerCommand>(64);

        let messages_clone = messages.clone();
        let connections_clone = connections.clone();
        let command_tx_clone = command_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(
                            stream,
                            messages_clone.clone(),
                            connections_clone.clone(),
                            subscription_seq.clone(),
                            command_tx_clone.subscribe(),
                        ));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            command_tx,
            messages,
            connections,
        }
    }

    /// Base WebSocket URL (the client appends its API key).
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of connections accepted so far.
    pub async fn connection_count(&self) -> u32 {
        *self.connections.lock().await
    }

    /// All text frames received from clients.
    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.iter().cloned().collect()
    }

    /// Push a raw text frame to every connected client.
    pub fn push(&self, frame: serde_json::Value) {
        let _ = self.command_tx.send(ServerCommand::Push(frame.to_string()));
    }

    /// Drop every open connection without a Close frame.
    pub fn kick_all(&self) {
        let _ = self.command_tx.send(ServerCommand::Kick);
    }

    /// Shutdown the listener.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
    subscription_seq: Arc<Mutex<u32>>,
    mut commands: broadcast::Receiver<ServerCommand>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    {
        let mut count = connections.lock().await;
        *count += 1;
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        messages.lock().await.push_back(text.clone());

                        let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&text) else {
                            continue;
                        };
                        if parsed.get("action") == Some(&serde_json::json!("subscribe")) {
                            let id = {
                                let mut seq = subscription_seq.lock().await;
                                *seq += 1;
                                *seq
                            };
                            let ack = serde_json::json!({
                                "type": "ack",
                                "subscription_id": format!("sub_{id}"),
                            });
                            let _ = write.send(Message::Text(ack.to_string())).await;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            command = commands.recv() => {
                match command {
                    Ok(ServerCommand::Push(frame)) => {
                        let _ = write.send(Message::Text(frame)).await;
                    }
                    Ok(ServerCommand::Kick) | Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                }
            }
        }
    }
}

/// Sample order notification frame.
pub fn order_frame(token_id: &str, user: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "event",
        "subscription_id": "sub_1",
        "data": {
            "token_id": token_id,
            "side": "BUY",
            "market_slug": "btc-updown-15m",
            "condition_id": "0xcond",
            "shares": 1000000,
            "shares_normalized": 1.0,
            "price": 0.5,
            "tx_hash": "0xtx",
            "title": "Bitcoin Up or Down",
            "timestamp": 1762755303,
            "order_hash": "0xorder",
            "user": user
        }
    })
}
