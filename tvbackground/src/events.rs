use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

/// Fan-out of events to any number of subscribers.
///
/// Each subscriber owns an unbounded channel, so every event reaches every
/// live subscriber in emission order. Dropped receivers are pruned on the
/// next broadcast.
#[derive(Clone)]
pub struct EventBus<T: Clone> {
    subscribers: Arc<Mutex<Vec<Sender<T>>>>,
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> EventBus<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = unbounded::<T>();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn broadcast(&self, event: T) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Observable value: holds the latest state and replays every replacement
/// to subscribers, in order.
pub struct StateCell<T: Clone> {
    current: Mutex<T>,
    bus: EventBus<T>,
}

impl<T: Clone> StateCell<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: Mutex::new(initial),
            bus: EventBus::new(),
        }
    }

    pub fn get(&self) -> T {
        self.current.lock().clone()
    }

    /// Replaces the value and notifies subscribers.
    pub fn set(&self, value: T) {
        // Held across the broadcast so two writers cannot reorder deliveries
        let mut current = self.current.lock();
        *current = value.clone();
        self.bus.broadcast(value);
    }

    /// Receiver of every later replacement. The current value is not
    /// replayed; read it with [`StateCell::get`].
    pub fn subscribe(&self) -> Receiver<T> {
        self.bus.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_replacement_is_delivered_in_order() {
        let cell = StateCell::new(0);
        let rx = cell.subscribe();

        for i in 1..=5 {
            cell.set(i);
        }

        let seen: Vec<i32> = rx.try_iter().collect();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(cell.get(), 5);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus: EventBus<u8> = EventBus::new();
        let rx = bus.subscribe();
        drop(bus.subscribe());

        bus.broadcast(1);
        assert_eq!(bus.subscribers.lock().len(), 1);
        assert_eq!(rx.try_recv().unwrap(), 1);
    }
}
