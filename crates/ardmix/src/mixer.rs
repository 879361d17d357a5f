//! Root of the strip tree.
//!
//! Everything prefixed `strip` is routed here. Strip descriptions create
//! strips; everything else goes to the strip at `addr[0]`. The first message
//! outside the strip namespace marks the initial snapshot as received and
//! flips [`Mixer::ready`]; the message itself is left for other components.

use ardproto::{ChannelHandle, Node, Value};
use tracing::{debug, info, warn};

use crate::component::{Children, Component, ComponentCore};
use crate::observable::Event;
use crate::strip::Strip;

#[derive(Debug, Clone, PartialEq)]
pub enum MixerEvent {
    /// A strip was described.
    Strips,
    Ready(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerProperty {
    Strips,
    Ready,
}

impl Event for MixerEvent {
    type Kind = MixerProperty;

    fn kind(&self) -> MixerProperty {
        match self {
            MixerEvent::Strips => MixerProperty::Strips,
            MixerEvent::Ready(_) => MixerProperty::Ready,
        }
    }
}

#[derive(Debug)]
pub struct Mixer {
    core: ComponentCore<MixerEvent>,
    strips: Children<Strip>,
    ready: bool,
}

impl Mixer {
    pub fn new(channel: ChannelHandle) -> Self {
        Self {
            core: ComponentCore::new(channel),
            strips: Children::default(),
            ready: false,
        }
    }

    /// The initial strip snapshot has been received.
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// Strips in the order they were described.
    pub fn strips(&self) -> impl Iterator<Item = &Strip> {
        self.strips.iter()
    }

    pub fn strips_mut(&mut self) -> impl Iterator<Item = &mut Strip> {
        self.strips.iter_mut()
    }

    pub fn strip_count(&self) -> usize {
        self.strips.len()
    }

    pub fn strip(&self, addr: &[u32]) -> Option<&Strip> {
        self.strips.get(addr)
    }

    pub fn strip_mut(&mut self, addr: &[u32]) -> Option<&mut Strip> {
        self.strips.get_mut(addr)
    }

    /// Case-insensitive lookup, ignoring surrounding whitespace.
    pub fn strip_by_name(&self, name: &str) -> Option<&Strip> {
        let wanted = normalize(name);
        self.strips.iter().find(|s| normalize(s.name()) == wanted)
    }

    pub fn strip_by_name_mut(&mut self, name: &str) -> Option<&mut Strip> {
        let wanted = normalize(name);
        self.strips.iter_mut().find(|s| normalize(s.name()) == wanted)
    }

    fn handle_strip(&mut self, node: Node, addr: &[u32], val: &[Value]) -> bool {
        if node == Node::StripDescription {
            let channel = self.core.channel().clone();
            let Some(strip) = Strip::from_description(channel, addr, val) else {
                warn!(
                    "{}: malformed strip description at {:?}: {:?}",
                    self.core.channel().name(),
                    addr,
                    val
                );
                return false;
            };
            debug!(
                "{}: strip {:?} is {:?} ({:?})",
                self.core.channel().name(),
                strip.addr(),
                strip.name(),
                strip.flags()
            );
            let key = strip.addr().to_vec();
            if self.strips.insert(key, strip) {
                debug!("{}: replaced strip {:?}", self.core.channel().name(), addr);
            }
            self.update_local(MixerEvent::Strips);
            return true;
        }

        if addr.is_empty() {
            return false;
        }
        match self.strips.get_mut(&addr[..1]) {
            Some(strip) => strip.handle(node, addr, val),
            None => {
                debug!(
                    "{}: {} for undescribed strip {:?}",
                    self.core.channel().name(),
                    node,
                    addr
                );
                false
            }
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Component for Mixer {
    type Event = MixerEvent;

    fn core(&self) -> &ComponentCore<MixerEvent> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore<MixerEvent> {
        &mut self.core
    }

    fn apply(&mut self, event: &MixerEvent) {
        match event {
            MixerEvent::Strips => {}
            MixerEvent::Ready(ready) => self.ready = *ready,
        }
    }

    fn handle(&mut self, node: Node, addr: &[u32], val: &[Value]) -> bool {
        if node.is_strip() {
            return self.handle_strip(node, addr, val);
        }
        if !self.ready {
            info!(
                "{}: mixer ready with {} strips",
                self.core.channel().name(),
                self.strips.len()
            );
            self.update_local(MixerEvent::Ready(true));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn describe(mixer: &mut Mixer, strip: u32, name: &str) -> bool {
        mixer.handle(Node::StripDescription, &[strip], &[name.into(), 1.0.into()])
    }

    #[test]
    fn readiness_flips_once_on_first_foreign_message() {
        let mut mixer = Mixer::new(ChannelHandle::detached("test"));
        let flips = Arc::new(Mutex::new(0));
        let sink = flips.clone();
        mixer.on(MixerProperty::Ready, move |_| *sink.lock().unwrap() += 1);

        assert!(describe(&mut mixer, 0, "Kick"));
        assert!(!mixer.ready());
        assert!(describe(&mut mixer, 1, "Snare"));
        assert!(!mixer.ready());

        assert!(!mixer.handle(Node::TransportTempo, &[], &[120.0.into()]));
        assert!(mixer.ready());

        assert!(describe(&mut mixer, 2, "Hat"));
        assert!(!mixer.handle(Node::TransportRoll, &[], &[true.into()]));
        assert!(mixer.ready());
        assert_eq!(*flips.lock().unwrap(), 1);
    }

    #[test]
    fn messages_before_description_are_dropped() {
        let mut mixer = Mixer::new(ChannelHandle::detached("test"));
        let events = Arc::new(Mutex::new(0));
        let sink = events.clone();
        mixer.on_any(move |_| *sink.lock().unwrap() += 1);

        assert!(!mixer.handle(Node::StripGain, &[0], &[(-6.0).into()]));
        assert!(!mixer.handle(Node::StripPluginDescription, &[0, 0], &["Comp".into()]));
        assert!(!mixer.handle(Node::StripGain, &[], &[(-6.0).into()]));

        assert_eq!(mixer.strip_count(), 0);
        assert_eq!(*events.lock().unwrap(), 0);
    }

    #[test]
    fn duplicate_description_replaces_in_place() {
        let mut mixer = Mixer::new(ChannelHandle::detached("test"));
        describe(&mut mixer, 0, "Kick");
        describe(&mut mixer, 1, "Snare");
        mixer.handle(Node::StripGain, &[0], &[(-6.0).into()]);

        assert!(describe(&mut mixer, 0, "Kick In"));

        let names: Vec<_> = mixer.strips().map(Strip::name).collect();
        assert_eq!(names, vec!["Kick In", "Snare"]);
        assert_eq!(mixer.strip(&[0]).unwrap().gain(), 0.0);
    }

    #[test]
    fn lookup_by_name_ignores_case_and_padding() {
        let mut mixer = Mixer::new(ChannelHandle::detached("test"));
        describe(&mut mixer, 0, "Kick");
        describe(&mut mixer, 1, " Lead Vox ");

        assert_eq!(mixer.strip_by_name("kick").unwrap().addr(), &[0]);
        assert_eq!(mixer.strip_by_name("LEAD VOX").unwrap().addr(), &[1]);
        assert!(mixer.strip_by_name("bass").is_none());

        mixer.strip_by_name_mut("kick").unwrap().handle(Node::StripMute, &[0], &[true.into()]);
        assert!(mixer.strip(&[0]).unwrap().mute());
    }

    #[test]
    fn deep_routing_reaches_parameters() {
        let mut mixer = Mixer::new(ChannelHandle::detached("test"));
        describe(&mut mixer, 0, "Kick");
        assert!(mixer.handle(Node::StripPluginDescription, &[0, 0], &["Comp".into()]));
        assert!(mixer.handle(
            Node::StripPluginParamDescription,
            &[0, 0, 0],
            &["Ratio".into(), "d".into(), 1.0.into(), 20.0.into(), true.into()],
        ));
        assert!(mixer.handle(Node::StripPluginParamValue, &[0, 0, 0], &[4.0.into()]));

        let ratio = mixer
            .strip(&[0])
            .and_then(|s| s.plugin(&[0, 0]))
            .and_then(|p| p.parameter(&[0, 0, 0]))
            .unwrap();
        assert_eq!(ratio.value(), &Value::Number(4.0));
    }
}
