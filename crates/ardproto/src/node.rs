//! State node vocabulary.
//!
//! A node names one category of mixer state. The set is closed: anything
//! else on the wire fails to decode. Names are hierarchical by prefix, so
//! `strip_plugin_param_value` belongs to the strip, plugin and parameter
//! subtrees at once; routing relies on this.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Prefix shared by every node routed through the mixer.
pub const STRIP_PREFIX: &str = "strip";
/// Prefix shared by every node routed through a strip to its plugins.
pub const PLUGIN_PREFIX: &str = "strip_plugin";
/// Prefix shared by every node routed through a plugin to its parameters.
pub const PARAMETER_PREFIX: &str = "strip_plugin_param";
/// Prefix shared by every transport node.
pub const TRANSPORT_PREFIX: &str = "transport";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    StripDescription,
    StripMeter,
    StripGain,
    StripPan,
    StripMute,
    StripPluginDescription,
    StripPluginEnable,
    StripPluginParamDescription,
    StripPluginParamValue,
    TransportTempo,
    TransportTime,
    TransportRoll,
    TransportRecord,
}

impl Node {
    pub const ALL: [Node; 13] = [
        Node::StripDescription,
        Node::StripMeter,
        Node::StripGain,
        Node::StripPan,
        Node::StripMute,
        Node::StripPluginDescription,
        Node::StripPluginEnable,
        Node::StripPluginParamDescription,
        Node::StripPluginParamValue,
        Node::TransportTempo,
        Node::TransportTime,
        Node::TransportRoll,
        Node::TransportRecord,
    ];

    /// Wire spelling of this node.
    pub fn as_str(self) -> &'static str {
        match self {
            Node::StripDescription => "strip_description",
            Node::StripMeter => "strip_meter",
            Node::StripGain => "strip_gain",
            Node::StripPan => "strip_pan",
            Node::StripMute => "strip_mute",
            Node::StripPluginDescription => "strip_plugin_description",
            Node::StripPluginEnable => "strip_plugin_enable",
            Node::StripPluginParamDescription => "strip_plugin_param_description",
            Node::StripPluginParamValue => "strip_plugin_param_value",
            Node::TransportTempo => "transport_tempo",
            Node::TransportTime => "transport_time",
            Node::TransportRoll => "transport_roll",
            Node::TransportRecord => "transport_record",
        }
    }

    /// Routed through the mixer (strips, plugins, parameters).
    pub fn is_strip(self) -> bool {
        self.as_str().starts_with(STRIP_PREFIX)
    }

    /// Routed through a strip to one of its plugins.
    pub fn is_plugin(self) -> bool {
        self.as_str().starts_with(PLUGIN_PREFIX)
    }

    /// Routed through a plugin to one of its parameters.
    pub fn is_parameter(self) -> bool {
        self.as_str().starts_with(PARAMETER_PREFIX)
    }

    pub fn is_transport(self) -> bool {
        self.as_str().starts_with(TRANSPORT_PREFIX)
    }

    /// True for the three nodes that instantiate a component.
    pub fn is_description(self) -> bool {
        matches!(
            self,
            Node::StripDescription
                | Node::StripPluginDescription
                | Node::StripPluginParamDescription
        )
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a node name outside the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown state node '{0}'")]
pub struct UnknownNode(pub String);

impl FromStr for Node {
    type Err = UnknownNode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Node::ALL
            .iter()
            .copied()
            .find(|node| node.as_str() == s)
            .ok_or_else(|| UnknownNode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_serde() {
        for node in Node::ALL {
            let json = serde_json::to_string(&node).unwrap();
            assert_eq!(json, format!("\"{}\"", node.as_str()));
            assert_eq!(node.as_str().parse::<Node>().unwrap(), node);
        }
    }

    #[test]
    fn prefixes_nest() {
        assert!(Node::StripPluginParamValue.is_strip());
        assert!(Node::StripPluginParamValue.is_plugin());
        assert!(Node::StripPluginParamValue.is_parameter());

        assert!(Node::StripPluginEnable.is_plugin());
        assert!(!Node::StripPluginEnable.is_parameter());

        assert!(Node::StripGain.is_strip());
        assert!(!Node::StripGain.is_plugin());

        assert!(Node::TransportRoll.is_transport());
        assert!(!Node::TransportRoll.is_strip());
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "strip_solo".parse::<Node>().unwrap_err();
        assert_eq!(err, UnknownNode("strip_solo".to_string()));
    }
}
