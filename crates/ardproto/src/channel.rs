//! WebSocket message channel following a reactor layout.
//!
//! - The socket is owned by a dedicated reactor task
//! - Callers talk to it through an mpsc command channel
//! - Correlated responses come back on a oneshot
//! - Everything else the reactor sees is published as a [`ChannelEvent`]
//!
//! The channel never reconnects by itself. When the socket goes away it
//! publishes [`ChannelEvent::Closed`] and returns to [`ChannelState::Closed`];
//! whoever owns the event receiver decides what happens next.
//!
//! Correlation is single-slot: one `send_and_receive` may be pending at a
//! time. A second call displaces the first, which is then never resolved by a
//! response and only observes [`ChannelError::ClosedAwaitingResponse`] once the
//! socket goes away.
//!
//! ```ignore
//! let (mut channel, mut events) = MessageChannel::new(ChannelConfig::for_host("studio", "127.0.0.1:3818"));
//! channel.open().await?;
//! channel.send(Message::new(Node::TransportRoll, vec![], vec![true.into()]))?;
//! while let Some(event) = events.recv().await { /* ... */ }
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, info, trace, warn};

use crate::message::{Message, MessageError};

/// Channel lifecycle, stored as a `u8` so handles can read it lock-free.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed = 0,
    Connecting = 1,
    Open = 2,
}

impl ChannelState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ChannelState::Connecting,
            2 => ChannelState::Open,
            _ => ChannelState::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Closed => "closed",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
        }
    }
}

/// Something the channel wants its owner to know about.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A message crossed the channel. `inbound` is true for socket-delivered
    /// traffic and false for the local echo of an outbound send.
    Message { message: Message, inbound: bool },
    /// Transport-level failure (handshake, read or write).
    Error(String),
    /// The socket is gone, whether by `close()` or by the peer.
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel is not open")]
    NotOpen,

    #[error("channel is already {0}")]
    AlreadyOpen(&'static str),

    #[error("handshake with {url} failed: {message}")]
    Handshake { url: String, message: String },

    #[error("handshake with {url} timed out")]
    HandshakeTimeout { url: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("socket closed awaiting response")]
    ClosedAwaitingResponse,

    #[error(transparent)]
    Message(#[from] MessageError),
}

/// Configuration for a MessageChannel
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Name for logging
    pub name: String,
    /// WebSocket URL (e.g., "ws://127.0.0.1:3818")
    pub url: String,
    /// Handshake timeout
    pub connect_timeout: Duration,
}

impl ChannelConfig {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Socket URL for a surface served at `host` (`host:port`).
    pub fn for_host(name: &str, host: &str) -> Self {
        Self::new(name, &format!("ws://{host}"))
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Command sent to the reactor task
enum ReactorCommand {
    /// Fire-and-forget text frame
    Send(String),
    /// Send and route the next message with a matching id to `response_tx`
    SendAndReceive {
        text: String,
        node_addr_id: String,
        response_tx: oneshot::Sender<Result<Message, ChannelError>>,
    },
    /// Reject the pending request and close the socket
    Close,
}

/// The single correlated request the reactor is waiting on
struct PendingReceive {
    node_addr_id: String,
    response_tx: oneshot::Sender<Result<Message, ChannelError>>,
}

/// State shared between the channel, its handles and the reactor.
struct Shared {
    name: String,
    state: AtomicU8,
    commands: RwLock<Option<mpsc::UnboundedSender<ReactorCommand>>>,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl Shared {
    fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ChannelState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn emit(&self, event: ChannelEvent) {
        // The owner may have dropped its receiver; nothing to do then.
        let _ = self.events_tx.send(event);
    }

    fn install(&self, tx: mpsc::UnboundedSender<ReactorCommand>) {
        *self.commands.write().unwrap_or_else(|e| e.into_inner()) = Some(tx);
    }

    fn uninstall(&self) -> Option<mpsc::UnboundedSender<ReactorCommand>> {
        self.commands.write().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn command(&self, command: ReactorCommand) -> Result<(), ChannelError> {
        let guard = self.commands.read().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(tx) => tx.send(command).map_err(|_| ChannelError::NotOpen),
            None => Err(ChannelError::NotOpen),
        }
    }
}

/// Cloneable sending side of a channel.
///
/// Survives reconnects: a handle taken before the socket dropped sends on
/// the new socket once the channel is reopened.
#[derive(Clone)]
pub struct ChannelHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish()
    }
}

impl ChannelHandle {
    /// A handle never attached to a socket. Every send fails with
    /// [`ChannelError::NotOpen`]; useful for replaying recorded traffic.
    pub fn detached(name: &str) -> Self {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                name: name.to_string(),
                state: AtomicU8::new(ChannelState::Closed as u8),
                commands: RwLock::new(None),
                events_tx,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Serialize and transmit immediately, then echo the message as an
    /// outbound [`ChannelEvent::Message`].
    pub fn send(&self, message: Message) -> Result<(), ChannelError> {
        let text = message.to_json_text()?;
        trace!("{}: send {}", self.shared.name, message);
        self.shared.command(ReactorCommand::Send(text))?;
        self.shared.emit(ChannelEvent::Message {
            message,
            inbound: false,
        });
        Ok(())
    }

    /// Send and wait for the next inbound message with the same
    /// node/address id. No timeout is applied; the wait ends only with a
    /// matching response or the loss of the socket.
    pub async fn send_and_receive(&self, message: Message) -> Result<Message, ChannelError> {
        let text = message.to_json_text()?;
        let (response_tx, response_rx) = oneshot::channel();

        self.shared.command(ReactorCommand::SendAndReceive {
            text,
            node_addr_id: message.node_addr_id(),
            response_tx,
        })?;
        self.shared.emit(ChannelEvent::Message {
            message,
            inbound: false,
        });

        match response_rx.await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::ClosedAwaitingResponse),
        }
    }
}

/// Bidirectional JSON message channel over a WebSocket.
pub struct MessageChannel {
    config: ChannelConfig,
    handle: ChannelHandle,
    reactor: Option<JoinHandle<()>>,
}

impl MessageChannel {
    /// Create a closed channel and the receiver its events are published on.
    pub fn new(config: ChannelConfig) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            name: config.name.clone(),
            state: AtomicU8::new(ChannelState::Closed as u8),
            commands: RwLock::new(None),
            events_tx,
        });

        let channel = Self {
            config,
            handle: ChannelHandle { shared },
            reactor: None,
        };
        (channel, events_rx)
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn handle(&self) -> ChannelHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> ChannelState {
        self.handle.state()
    }

    /// Perform the WebSocket handshake and spawn the reactor.
    ///
    /// A failed handshake is reported twice: as the returned error and as a
    /// [`ChannelEvent::Error`] for whoever watches the event stream.
    pub async fn open(&mut self) -> Result<(), ChannelError> {
        let shared = &self.handle.shared;
        let state = shared.state();
        if state != ChannelState::Closed {
            return Err(ChannelError::AlreadyOpen(state.as_str()));
        }

        // A reactor that exited on its own has already cleaned up.
        if let Some(reactor) = self.reactor.take() {
            let _ = reactor.await;
        }

        shared.set_state(ChannelState::Connecting);
        debug!("{}: connecting to {}", self.config.name, self.config.url);

        let handshake = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(self.config.url.as_str()),
        )
        .await;

        let socket = match handshake {
            Ok(Ok((socket, _response))) => socket,
            Ok(Err(e)) => {
                shared.set_state(ChannelState::Closed);
                let err = ChannelError::Handshake {
                    url: self.config.url.clone(),
                    message: e.to_string(),
                };
                shared.emit(ChannelEvent::Error(err.to_string()));
                return Err(err);
            }
            Err(_) => {
                shared.set_state(ChannelState::Closed);
                let err = ChannelError::HandshakeTimeout {
                    url: self.config.url.clone(),
                };
                shared.emit(ChannelEvent::Error(err.to_string()));
                return Err(err);
            }
        };

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        shared.install(cmd_tx);
        shared.set_state(ChannelState::Open);
        info!("{}: connected to {}", self.config.name, self.config.url);

        let reactor_shared = shared.clone();
        self.reactor = Some(tokio::spawn(async move {
            reactor_task(socket, cmd_rx, reactor_shared).await;
        }));

        Ok(())
    }

    /// Close the socket. A pending correlated request is rejected with
    /// [`ChannelError::ClosedAwaitingResponse`]; [`ChannelEvent::Closed`]
    /// follows once the reactor has exited.
    pub async fn close(&mut self) {
        if let Some(tx) = self.handle.shared.uninstall() {
            let _ = tx.send(ReactorCommand::Close);
        }
        if let Some(reactor) = self.reactor.take() {
            let _ = reactor.await;
        }
    }

    pub fn send(&self, message: Message) -> Result<(), ChannelError> {
        self.handle.send(message)
    }

    pub async fn send_and_receive(&self, message: Message) -> Result<Message, ChannelError> {
        self.handle.send_and_receive(message).await
    }
}

impl Drop for MessageChannel {
    fn drop(&mut self) {
        if let Some(tx) = self.handle.shared.uninstall() {
            let _ = tx.send(ReactorCommand::Close);
        }
    }
}

/// The reactor task - owns the socket, handles all I/O.
async fn reactor_task<S>(
    mut socket: S,
    mut cmd_rx: mpsc::UnboundedReceiver<ReactorCommand>,
    shared: Arc<Shared>,
) where
    S: Stream<Item = Result<WsMessage, WsError>> + Sink<WsMessage, Error = WsError> + Unpin,
{
    let name = shared.name.clone();
    let mut pending: Option<PendingReceive> = None;
    // Displaced requests are held, never answered, until the socket goes away.
    let mut orphaned: Vec<PendingReceive> = Vec::new();

    debug!("{}: reactor started", name);

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ReactorCommand::Send(text)) => {
                        if let Err(e) = socket.send(WsMessage::Text(text)).await {
                            warn!("{}: send failed: {}", name, e);
                            shared.emit(ChannelEvent::Error(e.to_string()));
                            break;
                        }
                    }
                    Some(ReactorCommand::SendAndReceive { text, node_addr_id, response_tx }) => {
                        let request = PendingReceive { node_addr_id, response_tx };
                        if let Some(previous) = pending.replace(request) {
                            warn!(
                                "{}: correlated request {} displaced before its response arrived",
                                name, previous.node_addr_id
                            );
                            orphaned.push(previous);
                        }
                        if let Err(e) = socket.send(WsMessage::Text(text)).await {
                            warn!("{}: send failed: {}", name, e);
                            shared.emit(ChannelEvent::Error(e.to_string()));
                            break;
                        }
                    }
                    Some(ReactorCommand::Close) | None => {
                        if let Some(request) = pending.take() {
                            debug!("{}: rejecting pending {} on close", name, request.node_addr_id);
                            let _ = request.response_tx.send(Err(ChannelError::ClosedAwaitingResponse));
                        }
                        if let Err(e) = socket.close().await {
                            debug!("{}: close handshake failed: {}", name, e);
                        }
                        info!("{}: closed", name);
                        break;
                    }
                }
            }

            frame = socket.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        match Message::from_json_text(&text) {
                            Ok(message) => {
                                let id = message.node_addr_id();
                                match pending.take() {
                                    Some(request) if request.node_addr_id == id => {
                                        trace!("{}: correlated response {}", name, id);
                                        let _ = request.response_tx.send(Ok(message));
                                    }
                                    other => {
                                        pending = other;
                                        trace!("{}: recv {}", name, message);
                                        shared.emit(ChannelEvent::Message { message, inbound: true });
                                    }
                                }
                            }
                            Err(e) => {
                                warn!("{}: dropping undecodable frame: {} ({} bytes)", name, e, text.len());
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!("{}: peer closed the socket ({:?})", name, frame);
                        break;
                    }
                    Some(Ok(other)) => {
                        trace!("{}: ignoring non-text frame ({} bytes)", name, other.len());
                    }
                    Some(Err(e)) => {
                        warn!("{}: receive error: {}", name, e);
                        shared.emit(ChannelEvent::Error(e.to_string()));
                        break;
                    }
                    None => {
                        info!("{}: socket stream ended", name);
                        break;
                    }
                }
            }
        }
    }

    drop(pending);
    drop(orphaned);

    shared.uninstall();
    shared.set_state(ChannelState::Closed);
    shared.emit(ChannelEvent::Closed);
    debug!("{}: reactor exiting", name);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_u8() {
        for state in [ChannelState::Closed, ChannelState::Connecting, ChannelState::Open] {
            assert_eq!(ChannelState::from_u8(state as u8), state);
        }
        assert_eq!(ChannelState::from_u8(42), ChannelState::Closed);
    }

    #[test]
    fn for_host_builds_ws_url() {
        let config = ChannelConfig::for_host("test", "10.0.0.2:3818");
        assert_eq!(config.url, "ws://10.0.0.2:3818");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn detached_handle_refuses_to_send() {
        let handle = ChannelHandle::detached("test");
        assert_eq!(handle.state(), ChannelState::Closed);
        let err = handle
            .send(Message::new(crate::Node::TransportRoll, vec![], vec![true.into()]))
            .unwrap_err();
        assert!(matches!(err, ChannelError::NotOpen));
    }

    #[tokio::test]
    async fn closed_channel_send_fails_without_echo() {
        let (channel, mut events) = MessageChannel::new(ChannelConfig::new("test", "ws://127.0.0.1:9"));
        let result = channel.send(Message::new(crate::Node::TransportRoll, vec![], vec![true.into()]));
        assert!(matches!(result, Err(ChannelError::NotOpen)));
        assert!(events.try_recv().is_err());
    }
}
