//! Base behaviour shared by the client and every node of the mixer tree.
//!
//! A component owns a [`ComponentCore`] (channel handle plus observers) and
//! implements [`Component::handle`], returning `true` when it consumed a
//! message and `false` to let the caller offer it elsewhere. Properties
//! change through one of two paths:
//!
//! - [`Component::update_local`] applies a value that came from the surface
//! - [`Component::update_remote`] applies a value set locally and sends it on
//!
//! Addressable components override [`Component::addr`] so outgoing messages
//! carry their position in the tree.

use ardproto::{ChannelError, ChannelHandle, Message, Node, Value};
use tracing::warn;

use crate::observable::{Event, Observable, ObserverId};

pub struct ComponentCore<E: Event> {
    channel: ChannelHandle,
    observers: Observable<E>,
}

impl<E: Event> ComponentCore<E> {
    pub fn new(channel: ChannelHandle) -> Self {
        Self {
            channel,
            observers: Observable::new(),
        }
    }

    pub fn channel(&self) -> &ChannelHandle {
        &self.channel
    }

    pub fn observers(&self) -> &Observable<E> {
        &self.observers
    }

    pub fn observers_mut(&mut self) -> &mut Observable<E> {
        &mut self.observers
    }
}

impl<E: Event> std::fmt::Debug for ComponentCore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentCore")
            .field("channel", &self.channel)
            .field("observers", &self.observers)
            .finish()
    }
}

pub trait Component {
    type Event: Event;

    fn core(&self) -> &ComponentCore<Self::Event>;

    fn core_mut(&mut self) -> &mut ComponentCore<Self::Event>;

    /// Store the value an event carries in its backing field.
    fn apply(&mut self, event: &Self::Event);

    /// Position in the mixer tree; empty for global components.
    fn addr(&self) -> &[u32] {
        &[]
    }

    /// Try to consume an inbound message.
    fn handle(&mut self, _node: Node, _addr: &[u32], _val: &[Value]) -> bool {
        false
    }

    fn handle_message(&mut self, message: &Message) -> bool {
        self.handle(message.node, &message.addr, &message.val)
    }

    /// Observe one kind of event.
    fn on<F>(&mut self, kind: <Self::Event as Event>::Kind, callback: F) -> ObserverId
    where
        F: FnMut(&Self::Event) + Send + 'static,
    {
        self.core_mut().observers_mut().add_observer(Some(kind), callback)
    }

    /// Observe every event.
    fn on_any<F>(&mut self, callback: F) -> ObserverId
    where
        F: FnMut(&Self::Event) + Send + 'static,
    {
        self.core_mut().observers_mut().add_observer(None, callback)
    }

    /// Stop observing. `None` drops the observer whatever it was registered for.
    fn off(&mut self, kind: Option<<Self::Event as Event>::Kind>, id: ObserverId) -> bool {
        self.core_mut().observers_mut().remove_observer(kind, id)
    }

    fn notify_property_changed(&mut self, event: &Self::Event) {
        self.core_mut().observers_mut().notify_observers(event);
    }

    /// Apply a value the surface owns and tell observers.
    fn update_local(&mut self, event: Self::Event) {
        self.apply(&event);
        self.notify_property_changed(&event);
    }

    /// Apply a locally made change, tell observers, then send it to the
    /// surface addressed with [`Component::addr`]. The local state is updated
    /// even when the send fails.
    fn update_remote(
        &mut self,
        node: Node,
        value: Value,
        event: Self::Event,
    ) -> Result<(), ChannelError> {
        self.update_local(event);
        let message = Message::new(node, self.addr().to_vec(), vec![value]);
        self.core().channel().send(message)
    }
}

/// Children of a tree node keyed by address, kept in arrival order.
#[derive(Debug)]
pub struct Children<T> {
    entries: Vec<(Vec<u32>, T)>,
}

impl<T> Default for Children<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Children<T> {
    /// Insert a child. A child already at `addr` is replaced in place and
    /// `true` is returned.
    pub fn insert(&mut self, addr: Vec<u32>, child: T) -> bool {
        match self.entries.iter_mut().find(|(key, _)| *key == addr) {
            Some(entry) => {
                entry.1 = child;
                true
            }
            None => {
                self.entries.push((addr, child));
                false
            }
        }
    }

    pub fn get(&self, addr: &[u32]) -> Option<&T> {
        self.entries
            .iter()
            .find(|(key, _)| key.as_slice() == addr)
            .map(|(_, child)| child)
    }

    pub fn get_mut(&mut self, addr: &[u32]) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key.as_slice() == addr)
            .map(|(_, child)| child)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, child)| child)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|(_, child)| child)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// First value of a property payload as a number.
pub(crate) fn number_payload(name: &str, node: Node, val: &[Value]) -> Option<f64> {
    let value = val.first().and_then(Value::as_f64);
    if value.is_none() {
        warn!("{}: ignoring {} with payload {:?}", name, node, val);
    }
    value
}

/// First value of a property payload as a boolean.
pub(crate) fn bool_payload(name: &str, node: Node, val: &[Value]) -> Option<bool> {
    let value = val.first().and_then(Value::as_bool);
    if value.is_none() {
        warn!("{}: ignoring {} with payload {:?}", name, node, val);
    }
    value
}
