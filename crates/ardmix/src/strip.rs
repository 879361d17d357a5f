//! A mixer strip (track, bus or VCA), addressed `[strip]`.

use std::fmt;

use ardproto::{ChannelError, ChannelHandle, Node, Value};
use tracing::{debug, warn};

use crate::component::{bool_payload, number_payload, Children, Component, ComponentCore};
use crate::observable::Event;
use crate::plugin::Plugin;

/// Route kind bits sent as the second value of a strip description.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct StripFlags(u32);

impl StripFlags {
    pub const AUDIO_TRACK: StripFlags = StripFlags(0x01);
    pub const MIDI_TRACK: StripFlags = StripFlags(0x02);
    pub const AUDIO_BUS: StripFlags = StripFlags(0x04);
    pub const MIDI_BUS: StripFlags = StripFlags(0x08);
    pub const VCA: StripFlags = StripFlags(0x10);
    pub const MASTER_BUS: StripFlags = StripFlags(0x20);
    pub const MONITOR_BUS: StripFlags = StripFlags(0x40);

    pub fn from_bits(bits: u32) -> Self {
        StripFlags(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// True when any bit of `other` is set.
    pub fn intersects(&self, other: StripFlags) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for StripFlags {
    type Output = StripFlags;

    fn bitor(self, rhs: StripFlags) -> StripFlags {
        StripFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for StripFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StripFlags({:#04x})", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StripEvent {
    Meter(f64),
    Gain(f64),
    Pan(f64),
    Mute(bool),
    /// A plugin was described.
    Plugins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripProperty {
    Meter,
    Gain,
    Pan,
    Mute,
    Plugins,
}

impl Event for StripEvent {
    type Kind = StripProperty;

    fn kind(&self) -> StripProperty {
        match self {
            StripEvent::Meter(_) => StripProperty::Meter,
            StripEvent::Gain(_) => StripProperty::Gain,
            StripEvent::Pan(_) => StripProperty::Pan,
            StripEvent::Mute(_) => StripProperty::Mute,
            StripEvent::Plugins => StripProperty::Plugins,
        }
    }
}

#[derive(Debug)]
pub struct Strip {
    core: ComponentCore<StripEvent>,
    addr: Vec<u32>,
    name: String,
    flags: StripFlags,
    meter: f64,
    gain: f64,
    pan: f64,
    mute: bool,
    plugins: Children<Plugin>,
}

impl Strip {
    /// Build from a `strip_description` payload: `[name, flags]`.
    pub fn from_description(channel: ChannelHandle, addr: &[u32], val: &[Value]) -> Option<Self> {
        if addr.is_empty() {
            return None;
        }
        let name = val.first()?.as_str()?.to_string();
        let flags = StripFlags::from_bits(val.get(1)?.as_u32()?);
        Some(Self {
            core: ComponentCore::new(channel),
            addr: addr[..1].to_vec(),
            name,
            flags,
            meter: 0.0,
            gain: 0.0,
            pan: 0.0,
            mute: false,
            plugins: Children::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> StripFlags {
        self.flags
    }

    pub fn is_audio(&self) -> bool {
        self.flags
            .intersects(StripFlags::AUDIO_TRACK | StripFlags::AUDIO_BUS)
    }

    pub fn is_midi(&self) -> bool {
        self.flags.intersects(StripFlags::MIDI_TRACK | StripFlags::MIDI_BUS)
    }

    pub fn is_vca(&self) -> bool {
        self.flags.intersects(StripFlags::VCA)
    }

    pub fn is_master(&self) -> bool {
        self.flags.intersects(StripFlags::MASTER_BUS)
    }

    pub fn is_monitor(&self) -> bool {
        self.flags.intersects(StripFlags::MONITOR_BUS)
    }

    pub fn has_pan(&self) -> bool {
        !self.is_midi() && !self.is_vca()
    }

    /// Peak level in dB; `-inf` when silent.
    pub fn meter(&self) -> f64 {
        self.meter
    }

    /// Fader gain in dB.
    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn pan(&self) -> f64 {
        self.pan
    }

    pub fn mute(&self) -> bool {
        self.mute
    }

    pub fn set_gain(&mut self, db: f64) -> Result<(), ChannelError> {
        self.update_remote(Node::StripGain, db.into(), StripEvent::Gain(db))
    }

    pub fn set_pan(&mut self, pan: f64) -> Result<(), ChannelError> {
        self.update_remote(Node::StripPan, pan.into(), StripEvent::Pan(pan))
    }

    pub fn set_mute(&mut self, mute: bool) -> Result<(), ChannelError> {
        self.update_remote(Node::StripMute, mute.into(), StripEvent::Mute(mute))
    }

    pub fn plugins(&self) -> impl Iterator<Item = &Plugin> {
        self.plugins.iter()
    }

    pub fn plugins_mut(&mut self) -> impl Iterator<Item = &mut Plugin> {
        self.plugins.iter_mut()
    }

    pub fn plugin(&self, addr: &[u32]) -> Option<&Plugin> {
        self.plugins.get(addr)
    }

    pub fn plugin_mut(&mut self, addr: &[u32]) -> Option<&mut Plugin> {
        self.plugins.get_mut(addr)
    }

    fn handle_plugin(&mut self, node: Node, addr: &[u32], val: &[Value]) -> bool {
        if node == Node::StripPluginDescription {
            let channel = self.core.channel().clone();
            let Some(plugin) = Plugin::from_description(channel, addr, val) else {
                warn!(
                    "{}: malformed plugin description at {:?}: {:?}",
                    self.core.channel().name(),
                    addr,
                    val
                );
                return false;
            };
            let key = plugin.addr().to_vec();
            if self.plugins.insert(key, plugin) {
                debug!("{}: replaced plugin {:?}", self.core.channel().name(), addr);
            }
            self.update_local(StripEvent::Plugins);
            return true;
        }

        if addr.len() < 2 {
            return false;
        }
        match self.plugins.get_mut(&addr[..2]) {
            Some(plugin) => plugin.handle(node, addr, val),
            None => {
                debug!(
                    "{}: {} for undescribed plugin {:?}",
                    self.core.channel().name(),
                    node,
                    addr
                );
                false
            }
        }
    }
}

impl Component for Strip {
    type Event = StripEvent;

    fn core(&self) -> &ComponentCore<StripEvent> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore<StripEvent> {
        &mut self.core
    }

    fn apply(&mut self, event: &StripEvent) {
        match event {
            StripEvent::Meter(db) => self.meter = *db,
            StripEvent::Gain(db) => self.gain = *db,
            StripEvent::Pan(pan) => self.pan = *pan,
            StripEvent::Mute(mute) => self.mute = *mute,
            StripEvent::Plugins => {}
        }
    }

    fn addr(&self) -> &[u32] {
        &self.addr
    }

    fn handle(&mut self, node: Node, addr: &[u32], val: &[Value]) -> bool {
        if node.is_plugin() {
            return self.handle_plugin(node, addr, val);
        }

        let name = self.core.channel().name();
        let event = match node {
            Node::StripMeter => number_payload(name, node, val).map(StripEvent::Meter),
            Node::StripGain => number_payload(name, node, val).map(StripEvent::Gain),
            Node::StripPan => number_payload(name, node, val).map(StripEvent::Pan),
            Node::StripMute => bool_payload(name, node, val).map(StripEvent::Mute),
            _ => return false,
        };
        if let Some(event) = event {
            self.update_local(event);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn strip(name: &str, flags: u32) -> Strip {
        Strip::from_description(
            ChannelHandle::detached("test"),
            &[0],
            &[name.into(), flags.into()],
        )
        .unwrap()
    }

    #[test]
    fn flags_classify_the_route() {
        let kick = strip("Kick", 0x01);
        assert!(kick.is_audio());
        assert!(!kick.is_midi());
        assert!(kick.has_pan());

        let synth = strip("Synth", 0x02);
        assert!(synth.is_midi());
        assert!(!synth.has_pan());

        let vca = strip("VCA 1", 0x10);
        assert!(vca.is_vca());
        assert!(!vca.has_pan());

        let master = strip("Master", 0x04 | 0x20);
        assert!(master.is_audio());
        assert!(master.is_master());
        assert!(!master.is_monitor());
    }

    #[test]
    fn description_requires_name_and_flags() {
        let channel = ChannelHandle::detached("test");
        assert!(Strip::from_description(channel.clone(), &[0], &["Kick".into()]).is_none());
        assert!(Strip::from_description(channel.clone(), &[0], &[1.0.into(), 1.0.into()]).is_none());
        assert!(Strip::from_description(channel, &[], &["Kick".into(), 1.0.into()]).is_none());
    }

    #[test]
    fn property_messages_update_one_field_each() {
        let mut kick = strip("Kick", 0x01);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        kick.on_any(move |e| sink.lock().unwrap().push(e.clone()));

        assert!(kick.handle(Node::StripGain, &[0], &[(-6.0).into()]));
        assert!(kick.handle(Node::StripMeter, &[0], &[Value::Number(f64::NEG_INFINITY)]));
        assert!(kick.handle(Node::StripMute, &[0], &[true.into()]));
        assert!(kick.handle(Node::StripPan, &[0], &[0.25.into()]));

        assert_eq!(kick.gain(), -6.0);
        assert_eq!(kick.meter(), f64::NEG_INFINITY);
        assert!(kick.mute());
        assert_eq!(kick.pan(), 0.25);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                StripEvent::Gain(-6.0),
                StripEvent::Meter(f64::NEG_INFINITY),
                StripEvent::Mute(true),
                StripEvent::Pan(0.25),
            ]
        );
    }

    #[test]
    fn malformed_payload_is_consumed_silently() {
        let mut kick = strip("Kick", 0x01);
        let seen = Arc::new(Mutex::new(0));
        let sink = seen.clone();
        kick.on_any(move |_| *sink.lock().unwrap() += 1);

        assert!(kick.handle(Node::StripGain, &[0], &["loud".into()]));
        assert!(kick.handle(Node::StripGain, &[0], &[]));
        assert_eq!(kick.gain(), 0.0);
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn plugin_traffic_routes_down() {
        let mut kick = strip("Kick", 0x01);
        assert!(kick.handle(Node::StripPluginDescription, &[0, 0], &["Comp".into()]));
        assert!(kick.handle(Node::StripPluginEnable, &[0, 0], &[true.into()]));
        assert!(kick.plugin(&[0, 0]).unwrap().enabled());

        // Unknown plugin.
        assert!(!kick.handle(Node::StripPluginEnable, &[0, 5], &[true.into()]));
        // Transport is someone else's business.
        assert!(!kick.handle(Node::TransportRoll, &[], &[true.into()]));
    }

    #[test]
    fn setters_update_locally_even_without_a_socket() {
        let mut kick = strip("Kick", 0x01);
        assert!(kick.set_gain(-3.0).is_err());
        assert!(kick.set_mute(true).is_err());
        assert_eq!(kick.gain(), -3.0);
        assert!(kick.mute());
    }
}
