//! ardmix - a live, observable mirror of an Ardour mixer
//!
//! The surface describes its strips, plugins and parameters over the socket;
//! this crate builds the matching component tree and keeps it in sync. Each
//! component can be observed, and setters send edits back to Ardour.
//!
//! ```text
//! ArdourClient
//! ├── Mixer ── Strip [s] ── Plugin [s, p] ── Parameter [s, p, n]
//! └── Transport
//! ```

pub mod client;
pub mod component;
pub mod metadata;
pub mod mixer;
pub mod observable;
pub mod parameter;
pub mod plugin;
pub mod strip;
pub mod transport;

pub use client::{ArdourClient, ClientConfig, ClientEvent, ClientEventKind, ClosePolicy};
pub use component::{Children, Component, ComponentCore};
pub use metadata::{parse_manifest, MetadataClient, MetadataError};
pub use mixer::{Mixer, MixerEvent, MixerProperty};
pub use observable::{Event, Observable, ObserverId};
pub use parameter::{Parameter, ParameterError, ParameterEvent, ParameterProperty, ValueType};
pub use plugin::{Plugin, PluginEvent, PluginProperty};
pub use strip::{Strip, StripEvent, StripFlags, StripProperty};
pub use transport::{Transport, TransportEvent, TransportProperty};

pub use ardproto::{ChannelError, ChannelHandle, ChannelState, Message, Node, Value};
