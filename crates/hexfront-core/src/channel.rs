//! Ordered synchronous delivery of game events to observers.
//!
//! Presentation layers (rendering, UI, logging) register observers and
//! receive every [`GameEvent`] in emission order, synchronously, before the
//! emitting transition returns. There is no backlog: an observer registered
//! after an event was emitted never sees that event.
//!
//! Observers cannot reach back into the [`Game`](crate::game::Game) from
//! inside a callback - the game is exclusively borrowed for the whole
//! ingestion call. The intended pattern is to buffer what the callback
//! receives and read the updated model through accessors afterwards.

use crate::events::GameEvent;
use std::fmt;

/// An observer of game events.
///
/// Implemented automatically for closures, so
/// `channel.subscribe(|e: &GameEvent| ...)` works without a named type.
pub trait GameObserver {
    /// Called once per emitted event, in emission order.
    fn on_event(&mut self, event: &GameEvent);
}

impl<F: FnMut(&GameEvent)> GameObserver for F {
    fn on_event(&mut self, event: &GameEvent) {
        self(event)
    }
}

/// Registry of observers with synchronous fan-out.
#[derive(Default)]
pub struct EventChannel {
    observers: Vec<Box<dyn GameObserver>>,
}

impl EventChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Register an observer. Observers are notified in registration order
    /// and stay registered for the channel's lifetime.
    pub fn subscribe(&mut self, observer: impl GameObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Deliver one event to every registered observer, in order.
    pub(crate) fn emit(&mut self, event: &GameEvent) {
        for observer in &mut self.observers {
            observer.on_event(event);
        }
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_delivers_in_emission_order_to_all_observers() {
        let mut channel = EventChannel::new();
        let first: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let second: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&first);
        channel.subscribe(move |e: &GameEvent| log.borrow_mut().push(e.kind()));
        let log = Rc::clone(&second);
        channel.subscribe(move |e: &GameEvent| log.borrow_mut().push(e.kind()));

        channel.emit(&GameEvent::GameData);
        channel.emit(&GameEvent::Wait {
            unit_id: "u1".into(),
        });

        assert_eq!(*first.borrow(), vec!["gameData", "wait"]);
        assert_eq!(*second.borrow(), vec!["gameData", "wait"]);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let mut channel = EventChannel::new();
        channel.emit(&GameEvent::GameData);

        let seen: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        channel.subscribe(move |e: &GameEvent| log.borrow_mut().push(e.kind()));

        channel.emit(&GameEvent::TurnTimeout { player: 1 });

        // No backlog: only the event emitted after subscribing arrives.
        assert_eq!(*seen.borrow(), vec!["turnTimeout"]);
        assert_eq!(channel.observer_count(), 1);
    }
}
