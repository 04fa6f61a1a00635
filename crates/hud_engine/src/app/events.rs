use std::collections::BTreeMap;

use super::deferred::ViewId;

pub trait HostEvent {
    fn name(&self) -> &'static str;

    /// True for the signal that ends a batch of simulation events. The host
    /// runs the `BatchComplete` sync point right after delivering it.
    fn completes_batch(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: BTreeMap<&'static str, Vec<ViewId>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, event: &'static str, view: ViewId) {
        let listeners = self.subscribers.entry(event).or_default();
        if !listeners.contains(&view) {
            listeners.push(view);
        }
    }

    pub fn unsubscribe(&mut self, event: &'static str, view: ViewId) {
        if let Some(listeners) = self.subscribers.get_mut(event) {
            listeners.retain(|id| *id != view);
            if listeners.is_empty() {
                self.subscribers.remove(event);
            }
        }
    }

    pub fn unsubscribe_all(&mut self, view: ViewId) {
        self.subscribers.retain(|_, listeners| {
            listeners.retain(|id| *id != view);
            !listeners.is_empty()
        });
    }

    pub fn subscribers(&self, event: &str) -> &[ViewId] {
        self.subscribers
            .get(event)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn subscription_count(&self) -> usize {
        self.subscribers.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_keep_attach_order_without_duplicates() {
        let mut bus = EventBus::new();
        bus.subscribe("PlotYieldChanged", ViewId(2));
        bus.subscribe("PlotYieldChanged", ViewId(1));
        bus.subscribe("PlotYieldChanged", ViewId(2));

        assert_eq!(bus.subscribers("PlotYieldChanged"), &[ViewId(2), ViewId(1)]);
        assert!(bus.subscribers("CityAddedToMap").is_empty());
    }

    #[test]
    fn unsubscribe_all_removes_view_everywhere() {
        let mut bus = EventBus::new();
        bus.subscribe("A", ViewId(1));
        bus.subscribe("B", ViewId(1));
        bus.subscribe("B", ViewId(3));

        bus.unsubscribe_all(ViewId(1));

        assert!(bus.subscribers("A").is_empty());
        assert_eq!(bus.subscribers("B"), &[ViewId(3)]);
        assert_eq!(bus.subscription_count(), 1);
    }

    #[test]
    fn unsubscribe_single_event() {
        let mut bus = EventBus::new();
        bus.subscribe("A", ViewId(1));
        bus.subscribe("B", ViewId(1));

        bus.unsubscribe("A", ViewId(1));

        assert!(bus.subscribers("A").is_empty());
        assert_eq!(bus.subscribers("B"), &[ViewId(1)]);
    }
}
