//! Change propagation
//!
//! Parties subscribe to named state changes. Raised signals queue up until
//! the owner drains them, which yields one delivery per interested
//! subscriber per raised signal.

use std::collections::VecDeque;

/// A named state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// The theme attribute on the rendering root changed
    ThemeChanged,
    /// Background or carousel state was written
    BackgroundChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u32);

/// A signal addressed to one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub subscriber: SubscriptionId,
    pub signal: Signal,
}

#[derive(Debug)]
struct Subscription {
    id: SubscriptionId,
    signals: Vec<Signal>,
}

#[derive(Debug, Default)]
pub struct ChangeBus {
    subscriptions: Vec<Subscription>,
    pending: VecDeque<Signal>,
    next_id: u32,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `signals`
    pub fn subscribe(&mut self, signals: &[Signal]) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            signals: signals.to_vec(),
        });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    pub fn is_subscribed(&self, id: SubscriptionId, signal: Signal) -> bool {
        self.subscriptions
            .iter()
            .any(|s| s.id == id && s.signals.contains(&signal))
    }

    /// Queue a signal. Signals nobody listens to are dropped on drain.
    pub fn raise(&mut self, signal: Signal) {
        log::trace!("signal raised: {:?}", signal);
        self.pending.push_back(signal);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Take queued signals as deliveries, in the order they were raised
    pub fn drain(&mut self) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        while let Some(signal) = self.pending.pop_front() {
            for sub in &self.subscriptions {
                if sub.signals.contains(&signal) {
                    deliveries.push(Delivery {
                        subscriber: sub.id,
                        signal,
                    });
                }
            }
        }
        deliveries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_delivery_per_event() {
        let mut bus = ChangeBus::new();
        let id = bus.subscribe(&[Signal::ThemeChanged, Signal::BackgroundChanged]);

        bus.raise(Signal::BackgroundChanged);
        bus.raise(Signal::ThemeChanged);
        bus.raise(Signal::BackgroundChanged);

        let deliveries = bus.drain();
        assert_eq!(deliveries.len(), 3);
        assert!(deliveries.iter().all(|d| d.subscriber == id));
        assert_eq!(deliveries[1].signal, Signal::ThemeChanged);
        assert!(!bus.has_pending());
    }

    #[test]
    fn test_filtered_by_signal() {
        let mut bus = ChangeBus::new();
        let theme_only = bus.subscribe(&[Signal::ThemeChanged]);
        let both = bus.subscribe(&[Signal::ThemeChanged, Signal::BackgroundChanged]);

        bus.raise(Signal::BackgroundChanged);
        let deliveries = bus.drain();
        assert_eq!(deliveries, vec![Delivery { subscriber: both, signal: Signal::BackgroundChanged }]);
        assert!(bus.is_subscribed(theme_only, Signal::ThemeChanged));
        assert!(!bus.is_subscribed(theme_only, Signal::BackgroundChanged));
    }

    #[test]
    fn test_unsubscribe_drops_deliveries() {
        let mut bus = ChangeBus::new();
        let id = bus.subscribe(&[Signal::BackgroundChanged]);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));

        bus.raise(Signal::BackgroundChanged);
        assert!(bus.drain().is_empty());
    }
}
