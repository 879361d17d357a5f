//! The `{node, addr, val}` envelope exchanged over the socket.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::Node;
use crate::value::Value;

/// Errors encoding or decoding a message.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("invalid message JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One unit of state traffic.
///
/// `addr` locates the component: `[strip]`, `[strip, plugin]`,
/// `[strip, plugin, param]`, or empty for global nodes such as transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub node: Node,
    #[serde(default)]
    pub addr: Vec<u32>,
    pub val: Vec<Value>,
}

impl Message {
    /// Build a message; numbers at or beyond the sentinel become infinities.
    pub fn new(node: Node, addr: impl Into<Vec<u32>>, val: Vec<Value>) -> Self {
        Self {
            node,
            addr: addr.into(),
            val: val.into_iter().map(Value::decoded).collect(),
        }
    }

    /// Correlation and routing key, see [`node_addr_id`].
    pub fn node_addr_id(&self) -> String {
        node_addr_id(self.node, &self.addr)
    }

    pub fn to_json_text(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json_text(text: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?} [", self.node, self.addr)?;
        for (i, value) in self.val.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

/// `node` followed by each address component, joined with `_`.
pub fn node_addr_id(node: Node, addr: &[u32]) -> String {
    let mut id = node.as_str().to_string();
    for component in addr {
        id.push('_');
        id.push_str(&component.to_string());
    }
    id
}
