//! A plugin on a strip, addressed `[strip, plugin]`.

use ardproto::{ChannelError, ChannelHandle, Node, Value};
use tracing::{debug, warn};

use crate::component::{bool_payload, Children, Component, ComponentCore};
use crate::observable::Event;
use crate::parameter::Parameter;

#[derive(Debug, Clone, PartialEq)]
pub enum PluginEvent {
    Enable(bool),
    /// A parameter was described.
    Parameters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginProperty {
    Enable,
    Parameters,
}

impl Event for PluginEvent {
    type Kind = PluginProperty;

    fn kind(&self) -> PluginProperty {
        match self {
            PluginEvent::Enable(_) => PluginProperty::Enable,
            PluginEvent::Parameters => PluginProperty::Parameters,
        }
    }
}

#[derive(Debug)]
pub struct Plugin {
    core: ComponentCore<PluginEvent>,
    addr: Vec<u32>,
    name: String,
    enabled: bool,
    parameters: Children<Parameter>,
}

impl Plugin {
    /// Build from a `strip_plugin_description` payload: `[name]`.
    pub fn from_description(channel: ChannelHandle, addr: &[u32], val: &[Value]) -> Option<Self> {
        if addr.len() < 2 {
            return None;
        }
        let name = val.first()?.as_str()?.to_string();
        Some(Self {
            core: ComponentCore::new(channel),
            addr: addr[..2].to_vec(),
            name,
            enabled: false,
            parameters: Children::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn strip_addr(&self) -> &[u32] {
        &self.addr[..1]
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), ChannelError> {
        self.update_remote(Node::StripPluginEnable, enabled.into(), PluginEvent::Enable(enabled))
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn parameters_mut(&mut self) -> impl Iterator<Item = &mut Parameter> {
        self.parameters.iter_mut()
    }

    pub fn parameter(&self, addr: &[u32]) -> Option<&Parameter> {
        self.parameters.get(addr)
    }

    pub fn parameter_mut(&mut self, addr: &[u32]) -> Option<&mut Parameter> {
        self.parameters.get_mut(addr)
    }

    fn handle_parameter(&mut self, node: Node, addr: &[u32], val: &[Value]) -> bool {
        if node == Node::StripPluginParamDescription {
            let channel = self.core.channel().clone();
            let Some(parameter) = Parameter::from_description(channel, addr, val) else {
                warn!(
                    "{}: malformed parameter description at {:?}: {:?}",
                    self.core.channel().name(),
                    addr,
                    val
                );
                return false;
            };
            let key = parameter.addr().to_vec();
            if self.parameters.insert(key, parameter) {
                debug!("{}: replaced parameter {:?}", self.core.channel().name(), addr);
            }
            self.update_local(PluginEvent::Parameters);
            return true;
        }

        if addr.len() < 3 {
            return false;
        }
        match self.parameters.get_mut(&addr[..3]) {
            Some(parameter) => parameter.handle(node, addr, val),
            None => {
                debug!(
                    "{}: {} for undescribed parameter {:?}",
                    self.core.channel().name(),
                    node,
                    addr
                );
                false
            }
        }
    }
}

impl Component for Plugin {
    type Event = PluginEvent;

    fn core(&self) -> &ComponentCore<PluginEvent> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore<PluginEvent> {
        &mut self.core
    }

    fn apply(&mut self, event: &PluginEvent) {
        match event {
            PluginEvent::Enable(enabled) => self.enabled = *enabled,
            PluginEvent::Parameters => {}
        }
    }

    fn addr(&self) -> &[u32] {
        &self.addr
    }

    fn handle(&mut self, node: Node, addr: &[u32], val: &[Value]) -> bool {
        if node.is_parameter() {
            return self.handle_parameter(node, addr, val);
        }
        if node != Node::StripPluginEnable {
            return false;
        }
        if let Some(enabled) = bool_payload(self.core.channel().name(), node, val) {
            self.update_local(PluginEvent::Enable(enabled));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::ValueType;

    fn eq() -> Plugin {
        Plugin::from_description(ChannelHandle::detached("test"), &[3, 1], &["a-EQ".into()]).unwrap()
    }

    fn describe(plugin: &mut Plugin, param: u32, name: &str) -> bool {
        plugin.handle(
            Node::StripPluginParamDescription,
            &[3, 1, param],
            &[name.into(), "d".into(), (-20.0).into(), 20.0.into(), false.into()],
        )
    }

    #[test]
    fn parameters_are_created_in_arrival_order() {
        let mut plugin = eq();
        assert!(describe(&mut plugin, 2, "High"));
        assert!(describe(&mut plugin, 0, "Low"));

        let names: Vec<_> = plugin.parameters().map(Parameter::name).collect();
        assert_eq!(names, vec!["High", "Low"]);
        assert_eq!(plugin.parameter(&[3, 1, 0]).unwrap().value_type(), ValueType::Double);
    }

    #[test]
    fn values_route_by_address() {
        let mut plugin = eq();
        describe(&mut plugin, 0, "Low");
        describe(&mut plugin, 1, "Mid");

        assert!(plugin.handle(Node::StripPluginParamValue, &[3, 1, 1], &[4.5.into()]));
        assert_eq!(plugin.parameter(&[3, 1, 1]).unwrap().value(), &Value::Number(4.5));
        assert_eq!(plugin.parameter(&[3, 1, 0]).unwrap().value(), &Value::Number(0.0));

        // Not described yet.
        assert!(!plugin.handle(Node::StripPluginParamValue, &[3, 1, 7], &[1.0.into()]));
        assert_eq!(plugin.parameters().count(), 2);
    }

    #[test]
    fn enable_is_consumed_here() {
        let mut plugin = eq();
        assert!(plugin.handle(Node::StripPluginEnable, &[3, 1], &[true.into()]));
        assert!(plugin.enabled());
        assert!(!plugin.handle(Node::StripGain, &[3], &[0.0.into()]));
    }

    #[test]
    fn malformed_parameter_description_is_not_consumed() {
        let mut plugin = eq();
        assert!(!plugin.handle(Node::StripPluginParamDescription, &[3, 1, 0], &["Low".into()]));
        assert_eq!(plugin.parameters().count(), 0);
    }
}
