//! Transport state: tempo, playhead time, roll and record.

use ardproto::{ChannelError, ChannelHandle, Node, Value};

use crate::component::{bool_payload, number_payload, Component, ComponentCore};
use crate::observable::Event;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Tempo(f64),
    Time(f64),
    Roll(bool),
    Record(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProperty {
    Tempo,
    Time,
    Roll,
    Record,
}

impl Event for TransportEvent {
    type Kind = TransportProperty;

    fn kind(&self) -> TransportProperty {
        match self {
            TransportEvent::Tempo(_) => TransportProperty::Tempo,
            TransportEvent::Time(_) => TransportProperty::Time,
            TransportEvent::Roll(_) => TransportProperty::Roll,
            TransportEvent::Record(_) => TransportProperty::Record,
        }
    }
}

#[derive(Debug)]
pub struct Transport {
    core: ComponentCore<TransportEvent>,
    tempo: f64,
    time: f64,
    roll: bool,
    record: bool,
}

impl Transport {
    pub fn new(channel: ChannelHandle) -> Self {
        Self {
            core: ComponentCore::new(channel),
            tempo: 0.0,
            time: 0.0,
            roll: false,
            record: false,
        }
    }

    /// Beats per minute.
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Playhead position in seconds. Read-only; the surface drives it.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn roll(&self) -> bool {
        self.roll
    }

    pub fn record(&self) -> bool {
        self.record
    }

    pub fn set_tempo(&mut self, bpm: f64) -> Result<(), ChannelError> {
        self.update_remote(Node::TransportTempo, bpm.into(), TransportEvent::Tempo(bpm))
    }

    pub fn set_roll(&mut self, roll: bool) -> Result<(), ChannelError> {
        self.update_remote(Node::TransportRoll, roll.into(), TransportEvent::Roll(roll))
    }

    pub fn set_record(&mut self, record: bool) -> Result<(), ChannelError> {
        self.update_remote(Node::TransportRecord, record.into(), TransportEvent::Record(record))
    }
}

impl Component for Transport {
    type Event = TransportEvent;

    fn core(&self) -> &ComponentCore<TransportEvent> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore<TransportEvent> {
        &mut self.core
    }

    fn apply(&mut self, event: &TransportEvent) {
        match event {
            TransportEvent::Tempo(bpm) => self.tempo = *bpm,
            TransportEvent::Time(seconds) => self.time = *seconds,
            TransportEvent::Roll(roll) => self.roll = *roll,
            TransportEvent::Record(record) => self.record = *record,
        }
    }

    fn handle(&mut self, node: Node, _addr: &[u32], val: &[Value]) -> bool {
        let name = self.core.channel().name();
        let event = match node {
            Node::TransportTempo => number_payload(name, node, val).map(TransportEvent::Tempo),
            Node::TransportTime => number_payload(name, node, val).map(TransportEvent::Time),
            Node::TransportRoll => bool_payload(name, node, val).map(TransportEvent::Roll),
            Node::TransportRecord => bool_payload(name, node, val).map(TransportEvent::Record),
            _ => return false,
        };
        if let Some(event) = event {
            self.update_local(event);
        }
        true
    }
}
