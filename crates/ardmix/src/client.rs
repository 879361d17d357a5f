//! Root component: owns the channel and the top-level components.
//!
//! The channel's reactor runs on its own task and publishes events; the
//! client applies them one at a time in [`ArdourClient::step`], so all
//! routing and observer dispatch happens on the caller's task in socket
//! order.
//!
//! Reconnection is the client's job, not the channel's. With
//! [`ClosePolicy::Reconnect`] a lost socket (or a failed handshake) is
//! retried after a fixed interval, forever, until [`ArdourClient::disconnect`].
//!
//! ```ignore
//! let mut client = ArdourClient::new(ClientConfig::new("ardctl", "127.0.0.1:3818"));
//! client.connect(true).await?;
//! client.wait_ready().await;
//! client.mixer_mut().unwrap().strip_by_name_mut("kick").unwrap().set_gain(-6.0)?;
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use ardconf::ArdConfig;
use ardproto::{
    ChannelConfig, ChannelError, ChannelEvent, ChannelHandle, ChannelState, Message,
    MessageChannel, Node, Value,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::component::{Component, ComponentCore};
use crate::metadata::{MetadataClient, MetadataError};
use crate::mixer::Mixer;
use crate::observable::Event;
use crate::transport::Transport;

/// Configuration for an ArdourClient
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name for logging
    pub name: String,
    /// `host:port` of the surface
    pub authority: String,
    /// Surface path for the manifest (e.g., "builtin/mixer")
    pub surface: String,
    /// Create the Mixer and Transport components
    pub components: bool,
    /// Delay before each reconnect attempt
    pub reconnect_interval: Duration,
    /// WebSocket handshake and HTTP timeout
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn new(name: &str, authority: &str) -> Self {
        Self {
            name: name.to_string(),
            authority: authority.to_string(),
            surface: "builtin/mixer".to_string(),
            components: true,
            reconnect_interval: Duration::from_millis(1_000),
            connect_timeout: Duration::from_millis(5_000),
        }
    }

    /// Build from the loaded configuration files.
    pub fn from_conf(name: &str, conf: &ArdConfig) -> Self {
        Self {
            name: name.to_string(),
            authority: conf.connection.authority(),
            surface: conf.connection.surface.clone(),
            components: conf.client.components,
            reconnect_interval: Duration::from_millis(conf.client.reconnect_interval_ms),
            connect_timeout: Duration::from_millis(conf.connection.connect_timeout_ms),
        }
    }

    pub fn with_surface(mut self, surface: &str) -> Self {
        self.surface = surface.to_string();
        self
    }

    pub fn with_components(mut self, components: bool) -> Self {
        self.components = components;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// What happens when the socket goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosePolicy {
    /// Intentional teardown: say nothing.
    Ignore,
    /// Report the disconnect and stay down.
    Notify,
    /// Report the disconnect and retry on the fixed interval.
    Reconnect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected(bool),
    Error(String),
    /// Every message crossing the channel; `inbound` is false for local sends.
    Message { message: Message, inbound: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEventKind {
    Connected,
    Error,
    Message,
}

impl Event for ClientEvent {
    type Kind = ClientEventKind;

    fn kind(&self) -> ClientEventKind {
        match self {
            ClientEvent::Connected(_) => ClientEventKind::Connected,
            ClientEvent::Error(_) => ClientEventKind::Error,
            ClientEvent::Message { .. } => ClientEventKind::Message,
        }
    }
}

pub struct ArdourClient {
    config: ClientConfig,
    channel: MessageChannel,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    core: ComponentCore<ClientEvent>,
    mixer: Option<Mixer>,
    transport: Option<Transport>,
    metadata: MetadataClient,
    connected: bool,
    close_policy: ClosePolicy,
    reconnect_pending: bool,
    reconnect_attempts: u64,
}

impl ArdourClient {
    /// Create a disconnected client.
    pub fn new(config: ClientConfig) -> Self {
        let channel_config = ChannelConfig::for_host(&config.name, &config.authority)
            .with_connect_timeout(config.connect_timeout);
        let (channel, events) = MessageChannel::new(channel_config);
        let handle = channel.handle();

        let (mixer, transport) = if config.components {
            (
                Some(Mixer::new(handle.clone())),
                Some(Transport::new(handle.clone())),
            )
        } else {
            (None, None)
        };

        let metadata =
            MetadataClient::new(&config.authority, &config.surface, config.connect_timeout);

        Self {
            config,
            channel,
            events,
            core: ComponentCore::new(handle),
            mixer,
            transport,
            metadata,
            connected: false,
            close_policy: ClosePolicy::Ignore,
            reconnect_pending: false,
            reconnect_attempts: 0,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn close_policy(&self) -> ClosePolicy {
        self.close_policy
    }

    /// Reconnect attempts made since the client was created.
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts
    }

    pub fn channel(&self) -> ChannelHandle {
        self.channel.handle()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn mixer(&self) -> Option<&Mixer> {
        self.mixer.as_ref()
    }

    pub fn mixer_mut(&mut self) -> Option<&mut Mixer> {
        self.mixer.as_mut()
    }

    pub fn transport(&self) -> Option<&Transport> {
        self.transport.as_ref()
    }

    pub fn transport_mut(&mut self) -> Option<&mut Transport> {
        self.transport.as_mut()
    }

    /// Open the socket. With `auto_reconnect`, a failed handshake is still
    /// returned but a retry is scheduled for the next [`step`](Self::step).
    pub async fn connect(&mut self, auto_reconnect: bool) -> Result<(), ChannelError> {
        self.settle().await;
        self.close_policy = if auto_reconnect {
            ClosePolicy::Reconnect
        } else {
            ClosePolicy::Notify
        };
        self.reconnect_pending = false;

        match self.channel.open().await {
            Ok(()) => {
                self.update_local(ClientEvent::Connected(true));
                Ok(())
            }
            Err(e) => {
                warn!("{}: connect failed: {}", self.config.name, e);
                if self.close_policy == ClosePolicy::Reconnect {
                    self.reconnect_pending = true;
                }
                Err(e)
            }
        }
    }

    /// Close the socket without triggering the reconnect policy.
    pub async fn disconnect(&mut self) {
        self.close_policy = ClosePolicy::Ignore;
        self.reconnect_pending = false;
        self.channel.close().await;
        if self.connected {
            self.update_local(ClientEvent::Connected(false));
        }
        info!("{}: disconnected", self.config.name);
    }

    pub fn send(&self, message: Message) -> Result<(), ChannelError> {
        self.channel.send(message)
    }

    pub async fn send_and_receive(&self, message: Message) -> Result<Message, ChannelError> {
        self.channel.send_and_receive(message).await
    }

    /// Process one channel event, or make one reconnect attempt.
    ///
    /// Returns `false` once nothing more can happen: the socket is closed,
    /// every event has been applied and no reconnect is scheduled.
    pub async fn step(&mut self) -> bool {
        let event = match self.events.try_recv() {
            Ok(event) => event,
            Err(_) if self.reconnect_pending => {
                self.reconnect().await;
                return true;
            }
            Err(_) if self.connected => match self.events.recv().await {
                Some(event) => event,
                None => return false,
            },
            Err(_) => return false,
        };
        self.apply_channel_event(event);
        true
    }

    /// Step until the connection is gone for good.
    pub async fn run(&mut self) {
        while self.step().await {}
    }

    /// Step until the mixer has received its initial snapshot. Returns
    /// `false` if the connection ended first or there is no mixer.
    pub async fn wait_ready(&mut self) -> bool {
        loop {
            match self.mixer.as_ref() {
                None => return false,
                Some(mixer) if mixer.ready() => return true,
                Some(_) => {}
            }
            if !self.step().await {
                return false;
            }
        }
    }

    pub async fn available_surfaces(&self) -> Result<serde_json::Value, MetadataError> {
        self.metadata.available_surfaces().await
    }

    pub async fn surface_manifest(&self) -> Result<BTreeMap<String, String>, MetadataError> {
        self.metadata.surface_manifest().await
    }

    fn apply_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Message { message, inbound } => {
                let event = ClientEvent::Message { message, inbound };
                self.notify_property_changed(&event);
                if let ClientEvent::Message {
                    message,
                    inbound: true,
                } = &event
                {
                    if !self.handle_message(message) {
                        debug!("{}: unhandled {}", self.config.name, message);
                    }
                }
            }
            ChannelEvent::Error(error) => {
                warn!("{}: channel error: {}", self.config.name, error);
                self.update_local(ClientEvent::Error(error));
            }
            ChannelEvent::Closed => self.on_closed(),
        }
    }

    /// Apply whatever a previous socket left in the queue, under the policy
    /// it ran with, so a new session never sees the old one's `Closed`.
    async fn settle(&mut self) {
        if self.channel.state() != ChannelState::Closed {
            return;
        }
        // Joins an exited reactor; its last event is queued once this returns.
        self.channel.close().await;
        while let Ok(event) = self.events.try_recv() {
            self.apply_channel_event(event);
        }
    }

    fn on_closed(&mut self) {
        match self.close_policy {
            ClosePolicy::Ignore => {}
            ClosePolicy::Notify => {
                info!("{}: connection closed", self.config.name);
                self.update_local(ClientEvent::Connected(false));
            }
            ClosePolicy::Reconnect => {
                info!(
                    "{}: connection closed, reconnecting in {:?}",
                    self.config.name, self.config.reconnect_interval
                );
                self.update_local(ClientEvent::Connected(false));
                self.reconnect_pending = true;
            }
        }
    }

    async fn reconnect(&mut self) {
        self.reconnect_pending = false;
        tokio::time::sleep(self.config.reconnect_interval).await;

        self.reconnect_attempts += 1;
        debug!(
            "{}: reconnect attempt {}",
            self.config.name, self.reconnect_attempts
        );
        match self.channel.open().await {
            Ok(()) => {
                info!(
                    "{}: reconnected after {} attempts",
                    self.config.name, self.reconnect_attempts
                );
                self.update_local(ClientEvent::Connected(true));
            }
            Err(e) => {
                warn!("{}: reconnect failed: {}", self.config.name, e);
                self.reconnect_pending = true;
            }
        }
    }
}

impl Component for ArdourClient {
    type Event = ClientEvent;

    fn core(&self) -> &ComponentCore<ClientEvent> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore<ClientEvent> {
        &mut self.core
    }

    fn apply(&mut self, event: &ClientEvent) {
        if let ClientEvent::Connected(connected) = event {
            self.connected = *connected;
        }
    }

    /// Offer the message to the mixer, then the transport.
    fn handle(&mut self, node: Node, addr: &[u32], val: &[Value]) -> bool {
        if let Some(mixer) = self.mixer.as_mut() {
            if mixer.handle(node, addr, val) {
                return true;
            }
        }
        if let Some(transport) = self.transport.as_mut() {
            if transport.handle(node, addr, val) {
                return true;
            }
        }
        false
    }
}

impl std::fmt::Debug for ArdourClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArdourClient")
            .field("name", &self.config.name)
            .field("authority", &self.config.authority)
            .field("connected", &self.connected)
            .field("close_policy", &self.close_policy)
            .field("reconnect_attempts", &self.reconnect_attempts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn inbound(node: Node, addr: &[u32], val: Vec<Value>) -> ChannelEvent {
        ChannelEvent::Message {
            message: Message::new(node, addr.to_vec(), val),
            inbound: true,
        }
    }

    #[test]
    fn config_from_conf() {
        let mut conf = ArdConfig::default();
        conf.connection.host = "studio.local".to_string();
        conf.client.reconnect_interval_ms = 250;
        conf.client.components = false;

        let config = ClientConfig::from_conf("ardctl", &conf);
        assert_eq!(config.authority, "studio.local:3818");
        assert_eq!(config.surface, "builtin/mixer");
        assert_eq!(config.reconnect_interval, Duration::from_millis(250));
        assert!(!config.components);
    }

    #[tokio::test]
    async fn components_follow_config() {
        let with = ArdourClient::new(ClientConfig::new("test", "127.0.0.1:9"));
        assert!(with.mixer().is_some() && with.transport().is_some());

        let without = ArdourClient::new(ClientConfig::new("test", "127.0.0.1:9").with_components(false));
        assert!(without.mixer().is_none() && without.transport().is_none());
    }

    #[tokio::test]
    async fn inbound_messages_go_to_observers_then_components() {
        let mut client = ArdourClient::new(ClientConfig::new("test", "127.0.0.1:9"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        client.on(ClientEventKind::Message, move |e| sink.lock().unwrap().push(e.clone()));

        client.apply_channel_event(inbound(Node::StripDescription, &[0], vec!["Kick".into(), 1.0.into()]));
        client.apply_channel_event(inbound(Node::TransportTempo, &[], vec![140.0.into()]));

        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(client.mixer().unwrap().strip_count(), 1);
        assert!(client.mixer().unwrap().ready());
        assert_eq!(client.transport().unwrap().tempo(), 140.0);
    }

    #[tokio::test]
    async fn outbound_echoes_are_not_routed() {
        let mut client = ArdourClient::new(ClientConfig::new("test", "127.0.0.1:9"));
        client.apply_channel_event(ChannelEvent::Message {
            message: Message::new(Node::TransportTempo, vec![], vec![99.0.into()]),
            inbound: false,
        });
        assert_eq!(client.transport().unwrap().tempo(), 0.0);
        assert!(!client.mixer().unwrap().ready());
    }

    #[tokio::test]
    async fn close_policy_decides_what_a_close_means() {
        let mut client = ArdourClient::new(ClientConfig::new("test", "127.0.0.1:9"));
        let states = Arc::new(Mutex::new(Vec::new()));
        let sink = states.clone();
        client.on(ClientEventKind::Connected, move |e| sink.lock().unwrap().push(e.clone()));

        client.connected = true;
        client.close_policy = ClosePolicy::Ignore;
        client.apply_channel_event(ChannelEvent::Closed);
        assert!(states.lock().unwrap().is_empty());
        assert!(!client.reconnect_pending);

        client.close_policy = ClosePolicy::Notify;
        client.apply_channel_event(ChannelEvent::Closed);
        assert!(!client.reconnect_pending);

        client.close_policy = ClosePolicy::Reconnect;
        client.apply_channel_event(ChannelEvent::Closed);
        assert!(client.reconnect_pending);

        assert_eq!(
            *states.lock().unwrap(),
            vec![ClientEvent::Connected(false), ClientEvent::Connected(false)]
        );
    }

    #[tokio::test]
    async fn step_on_a_fresh_client_returns_false() {
        let mut client = ArdourClient::new(ClientConfig::new("test", "127.0.0.1:9"));
        assert!(!client.step().await);
        assert!(!client.wait_ready().await);
    }
}
