//! Loopback WebSocket surface for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ardproto::Message;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;

pub const WAIT: Duration = Duration::from_secs(2);

enum ServerCommand {
    Text(String),
    Close,
}

/// Accepts WebSocket clients on 127.0.0.1 and hands each one to the test.
pub struct MockSurface {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    accepted: mpsc::UnboundedReceiver<ServerConn>,
    task: JoinHandle<()>,
}

impl MockSurface {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let (accepted_tx, accepted) = mpsc::unbounded_channel();

        let counter = connections.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<ServerCommand>();
                let (text_tx, text_rx) = mpsc::unbounded_channel::<String>();
                let _ = accepted_tx.send(ServerConn {
                    tx: cmd_tx,
                    rx: text_rx,
                });

                tokio::spawn(async move {
                    let mut ws = ws;
                    loop {
                        tokio::select! {
                            cmd = cmd_rx.recv() => match cmd {
                                Some(ServerCommand::Text(text)) => {
                                    if ws.send(WsMessage::Text(text)).await.is_err() {
                                        break;
                                    }
                                }
                                Some(ServerCommand::Close) | None => {
                                    let _ = ws.close(None).await;
                                    break;
                                }
                            },
                            frame = ws.next() => match frame {
                                Some(Ok(WsMessage::Text(text))) => {
                                    let _ = text_tx.send(text);
                                }
                                Some(Ok(_)) => {}
                                _ => break,
                            },
                        }
                    }
                });
            }
        });

        Self {
            addr,
            connections,
            accepted,
            task,
        }
    }

    /// `host:port` of the listener.
    pub fn authority(&self) -> String {
        self.addr.to_string()
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// TCP connections seen so far, including failed handshakes.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Next client to complete the handshake.
    pub async fn accept(&mut self) -> ServerConn {
        tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .expect("no client connected in time")
            .expect("mock surface stopped")
    }
}

impl Drop for MockSurface {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Server side of one client connection. Dropping it closes the socket.
pub struct ServerConn {
    tx: mpsc::UnboundedSender<ServerCommand>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl ServerConn {
    pub fn send(&self, message: &Message) {
        self.send_text(&message.to_json_text().unwrap());
    }

    pub fn send_text(&self, text: &str) {
        self.tx.send(ServerCommand::Text(text.to_string())).unwrap();
    }

    pub fn close(&self) {
        let _ = self.tx.send(ServerCommand::Close);
    }

    pub async fn recv_text(&mut self) -> String {
        tokio::time::timeout(WAIT, self.rx.recv())
            .await
            .expect("client sent nothing in time")
            .expect("client connection closed")
    }

    pub async fn recv(&mut self) -> Message {
        let text = self.recv_text().await;
        Message::from_json_text(&text).unwrap()
    }
}

/// An address with nothing listening on it.
pub async fn dead_authority() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}
