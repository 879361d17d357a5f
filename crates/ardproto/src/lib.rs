//! ardproto - wire protocol for the Ardour WebSockets control surface
//!
//! Every piece of mixer state travels as a small JSON object
//! `{"node": ..., "addr": [...], "val": [...]}`. This crate defines the node
//! vocabulary, the value encoding (including the `±1e128` infinity
//! sentinel) and a [`MessageChannel`] that carries messages over a
//! WebSocket with optional request/response correlation.

pub mod channel;
pub mod message;
pub mod node;
pub mod value;

pub use channel::{
    ChannelConfig, ChannelError, ChannelEvent, ChannelHandle, ChannelState, MessageChannel,
};
pub use message::{node_addr_id, Message, MessageError};
pub use node::{Node, UnknownNode};
pub use value::{decode_float, encode_float, Value, INFINITY_SENTINEL};
