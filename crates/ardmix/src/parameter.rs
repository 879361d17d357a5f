//! A single plugin parameter, addressed `[strip, plugin, param]`.

use std::fmt;

use ardproto::{ChannelError, ChannelHandle, Node, Value};
use tracing::warn;

use crate::component::{Component, ComponentCore};
use crate::observable::Event;

/// Value domain of a parameter, fixed by its description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Boolean,
    Integer,
    Double,
}

impl ValueType {
    /// Decode the one-letter tag used on the wire (`b`, `i`, `d`).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "b" => Some(ValueType::Boolean),
            "i" => Some(ValueType::Integer),
            "d" => Some(ValueType::Double),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ValueType::Boolean => "b",
            ValueType::Integer => "i",
            ValueType::Double => "d",
        }
    }

    pub fn is_boolean(&self) -> bool {
        *self == ValueType::Boolean
    }

    pub fn is_integer(&self) -> bool {
        *self == ValueType::Integer
    }

    pub fn is_double(&self) -> bool {
        *self == ValueType::Double
    }

    /// Value a parameter holds before the surface reports one.
    fn initial(&self) -> Value {
        match self {
            ValueType::Boolean => Value::Bool(false),
            ValueType::Integer | ValueType::Double => Value::Number(0.0),
        }
    }

    /// Bring a wire value into this domain, if it can be.
    fn coerce(&self, value: &Value) -> Option<Value> {
        match self {
            ValueType::Boolean => value.as_bool().map(Value::Bool),
            ValueType::Integer | ValueType::Double => value.as_f64().map(Value::Number),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::Double => "double",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParameterError {
    #[error("parameter {name} takes {expected} values, got {value}")]
    Type {
        name: String,
        expected: ValueType,
        value: Value,
    },

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterEvent {
    Value(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterProperty {
    Value,
}

impl Event for ParameterEvent {
    type Kind = ParameterProperty;

    fn kind(&self) -> ParameterProperty {
        match self {
            ParameterEvent::Value(_) => ParameterProperty::Value,
        }
    }
}

#[derive(Debug)]
pub struct Parameter {
    core: ComponentCore<ParameterEvent>,
    addr: Vec<u32>,
    name: String,
    value_type: ValueType,
    min: f64,
    max: f64,
    is_log: bool,
    value: Value,
}

impl Parameter {
    /// Build from a `strip_plugin_param_description` payload:
    /// `[name, type, min, max, is_log]`.
    pub fn from_description(channel: ChannelHandle, addr: &[u32], val: &[Value]) -> Option<Self> {
        if addr.len() < 3 {
            return None;
        }
        let name = val.first()?.as_str()?.to_string();
        let value_type = ValueType::from_tag(val.get(1)?.as_str()?)?;
        let min = val.get(2)?.as_f64()?;
        let max = val.get(3)?.as_f64()?;
        let is_log = val.get(4)?.as_bool()?;

        Some(Self {
            core: ComponentCore::new(channel),
            addr: addr[..3].to_vec(),
            name,
            value_type,
            min,
            max,
            is_log,
            value: value_type.initial(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Display hint: the control is best shown on a logarithmic scale.
    pub fn is_log(&self) -> bool {
        self.is_log
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn strip_addr(&self) -> &[u32] {
        &self.addr[..1]
    }

    pub fn plugin_addr(&self) -> &[u32] {
        &self.addr[..2]
    }

    /// Set the value locally and on the surface. The value is coerced to
    /// the parameter's type first; one that doesn't fit is rejected before
    /// anything changes.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<(), ParameterError> {
        let value = value.into();
        let Some(value) = self.value_type.coerce(&value) else {
            return Err(ParameterError::Type {
                name: self.name.clone(),
                expected: self.value_type,
                value,
            });
        };
        self.update_remote(
            Node::StripPluginParamValue,
            value.clone(),
            ParameterEvent::Value(value),
        )?;
        Ok(())
    }
}

impl Component for Parameter {
    type Event = ParameterEvent;

    fn core(&self) -> &ComponentCore<ParameterEvent> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore<ParameterEvent> {
        &mut self.core
    }

    fn apply(&mut self, event: &ParameterEvent) {
        match event {
            ParameterEvent::Value(value) => self.value = value.clone(),
        }
    }

    fn addr(&self) -> &[u32] {
        &self.addr
    }

    fn handle(&mut self, node: Node, _addr: &[u32], val: &[Value]) -> bool {
        if node != Node::StripPluginParamValue {
            return false;
        }
        match val.first().and_then(|v| self.value_type.coerce(v)) {
            Some(value) => self.update_local(ParameterEvent::Value(value)),
            None => warn!(
                "{}: ignoring {} value {:?} for parameter {:?}",
                self.core.channel().name(),
                self.value_type,
                val,
                self.addr
            ),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn cutoff() -> Parameter {
        Parameter::from_description(
            ChannelHandle::detached("test"),
            &[1, 0, 4],
            &["Cutoff".into(), "d".into(), 20.0.into(), 20000.0.into(), true.into()],
        )
        .unwrap()
    }

    #[test]
    fn description_fields() {
        let param = cutoff();
        assert_eq!(param.name(), "Cutoff");
        assert_eq!(param.value_type(), ValueType::Double);
        assert_eq!(param.min(), 20.0);
        assert_eq!(param.max(), 20000.0);
        assert!(param.is_log());
        assert_eq!(param.value(), &Value::Number(0.0));
        assert_eq!(param.strip_addr(), &[1]);
        assert_eq!(param.plugin_addr(), &[1, 0]);
        assert_eq!(param.addr(), &[1, 0, 4]);
    }

    #[test]
    fn boolean_parameter_starts_false_and_coerces() {
        let mut param = Parameter::from_description(
            ChannelHandle::detached("test"),
            &[0, 0, 0],
            &["Bypass".into(), "b".into(), 0.0.into(), 1.0.into(), false.into()],
        )
        .unwrap();
        assert_eq!(param.value(), &Value::Bool(false));

        assert!(param.handle(Node::StripPluginParamValue, &[0, 0, 0], &[Value::Number(1.0)]));
        assert_eq!(param.value(), &Value::Bool(true));
    }

    #[test]
    fn malformed_descriptions_are_rejected() {
        let channel = ChannelHandle::detached("test");
        let full: Vec<Value> = vec!["Q".into(), "d".into(), 0.0.into(), 1.0.into(), false.into()];

        assert!(Parameter::from_description(channel.clone(), &[0, 0], &full).is_none());
        assert!(Parameter::from_description(channel.clone(), &[0, 0, 0], &full[..4]).is_none());

        let mut bad_type = full.clone();
        bad_type[1] = "x".into();
        assert!(Parameter::from_description(channel, &[0, 0, 0], &bad_type).is_none());
    }

    #[test]
    fn value_updates_notify_once() {
        let mut param = cutoff();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        param.on(ParameterProperty::Value, move |e| sink.lock().unwrap().push(e.clone()));

        assert!(param.handle(Node::StripPluginParamValue, &[1, 0, 4], &[440.0.into()]));
        assert!(param.handle(Node::StripPluginParamValue, &[1, 0, 4], &["loud".into()]));
        assert!(!param.handle(Node::StripPluginEnable, &[1, 0], &[true.into()]));

        assert_eq!(*seen.lock().unwrap(), vec![ParameterEvent::Value(Value::Number(440.0))]);
    }

    #[test]
    fn set_value_updates_locally_when_detached() {
        let mut param = cutoff();
        assert!(matches!(
            param.set_value(880.0),
            Err(ParameterError::Channel(ChannelError::NotOpen))
        ));
        assert_eq!(param.value(), &Value::Number(880.0));
    }

    #[test]
    fn set_value_rejects_values_outside_the_type() {
        let mut param = cutoff();
        let seen = Arc::new(Mutex::new(0));
        let sink = seen.clone();
        param.on(ParameterProperty::Value, move |_| *sink.lock().unwrap() += 1);

        let err = param.set_value("loud").unwrap_err();
        assert!(matches!(
            err,
            ParameterError::Type { expected: ValueType::Double, .. }
        ));
        assert_eq!(param.value(), &Value::Number(0.0));
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn set_value_coerces_to_boolean() {
        let mut bypass = Parameter::from_description(
            ChannelHandle::detached("test"),
            &[1, 0, 2],
            &["Bypass".into(), "b".into(), 0.0.into(), 1.0.into(), false.into()],
        )
        .unwrap();
        let _ = bypass.set_value(1.0);
        assert_eq!(bypass.value(), &Value::Bool(true));
    }
}
