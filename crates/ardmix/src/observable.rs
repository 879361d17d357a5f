//! Synchronous event subject shared by every component.
//!
//! Observers register for one event kind, or for all of them with `None`.
//! Dispatch runs in the caller's stack: wildcard observers first, then the
//! observers of the specific kind, each group in registration order.

use std::fmt;

/// An event a component can emit. `Kind` is the fieldless tag observers
/// subscribe to; the event itself carries the new value.
pub trait Event: fmt::Debug {
    type Kind: Copy + Eq + fmt::Debug;

    fn kind(&self) -> Self::Kind;
}

/// Token returned by [`Observable::add_observer`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub type Callback<E> = Box<dyn FnMut(&E) + Send>;

struct Registration<E: Event> {
    id: ObserverId,
    kind: Option<E::Kind>,
    callback: Callback<E>,
}

pub struct Observable<E: Event> {
    next_id: u64,
    registrations: Vec<Registration<E>>,
}

impl<E: Event> Default for Observable<E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            registrations: Vec::new(),
        }
    }
}

impl<E: Event> fmt::Debug for Observable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("observers", &self.registrations.len())
            .finish()
    }
}

impl<E: Event> Observable<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `kind`, or for every event when `kind` is `None`.
    pub fn add_observer<F>(&mut self, kind: Option<E::Kind>, callback: F) -> ObserverId
    where
        F: FnMut(&E) + Send + 'static,
    {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.registrations.push(Registration {
            id,
            kind,
            callback: Box::new(callback),
        });
        id
    }

    /// Unregister an observer. With `Some(kind)` only a registration under
    /// that kind matches; with `None` the observer is removed whatever it was
    /// registered for. Returns whether anything was removed.
    pub fn remove_observer(&mut self, kind: Option<E::Kind>, id: ObserverId) -> bool {
        let before = self.registrations.len();
        self.registrations
            .retain(|r| !(r.id == id && (kind.is_none() || r.kind == kind)));
        self.registrations.len() != before
    }

    pub fn notify_observers(&mut self, event: &E) {
        let kind = event.kind();
        for registration in self.registrations.iter_mut().filter(|r| r.kind.is_none()) {
            (registration.callback)(event);
        }
        for registration in self
            .registrations
            .iter_mut()
            .filter(|r| r.kind == Some(kind))
        {
            (registration.callback)(event);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.registrations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Fader {
        Level(f64),
        Muted(bool),
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum FaderKind {
        Level,
        Muted,
    }

    impl Event for Fader {
        type Kind = FaderKind;

        fn kind(&self) -> FaderKind {
            match self {
                Fader::Level(_) => FaderKind::Level,
                Fader::Muted(_) => FaderKind::Muted,
            }
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn FnMut(&Fader) + Send>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |tag: &str| {
            let sink = sink.clone();
            let tag = tag.to_string();
            Box::new(move |event: &Fader| sink.lock().unwrap().push(format!("{tag}:{event:?}")))
                as Box<dyn FnMut(&Fader) + Send>
        };
        (log, make)
    }

    #[test]
    fn wildcards_run_before_specific_observers() {
        let (log, make) = recorder();
        let mut observable: Observable<Fader> = Observable::new();
        observable.add_observer(Some(FaderKind::Level), make("level-a"));
        observable.add_observer(None, make("any"));
        observable.add_observer(Some(FaderKind::Level), make("level-b"));
        observable.add_observer(Some(FaderKind::Muted), make("muted"));

        observable.notify_observers(&Fader::Level(-6.0));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["any:Level(-6.0)", "level-a:Level(-6.0)", "level-b:Level(-6.0)"]
        );
    }

    #[test]
    fn remove_with_kind_only_matches_that_kind() {
        let (log, make) = recorder();
        let mut observable: Observable<Fader> = Observable::new();
        let id = observable.add_observer(Some(FaderKind::Muted), make("muted"));

        assert!(!observable.remove_observer(Some(FaderKind::Level), id));
        assert!(observable.remove_observer(Some(FaderKind::Muted), id));
        assert!(!observable.remove_observer(Some(FaderKind::Muted), id));

        observable.notify_observers(&Fader::Muted(true));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn remove_without_kind_removes_wildcards_too() {
        let (log, make) = recorder();
        let mut observable: Observable<Fader> = Observable::new();
        let any = observable.add_observer(None, make("any"));
        let level = observable.add_observer(Some(FaderKind::Level), make("level"));

        assert!(observable.remove_observer(None, any));
        observable.notify_observers(&Fader::Level(1.0));
        assert_eq!(*log.lock().unwrap(), vec!["level:Level(1.0)"]);

        assert!(observable.remove_observer(None, level));
        assert_eq!(observable.observer_count(), 0);
    }
}
