use std::any::Any;
use std::time::Instant;

use tracing::{debug, info, trace};

use super::deferred::{DeferredQueue, FrameRequester, SyncPoint, ViewId};
use super::events::{EventBus, HostEvent};
use super::scheduler::FlushReport;
use super::tools::{PerfStats, PerfStatsSnapshot};

/// What a view sees while it handles an event or flushes: read-only model
/// access and a way to ask for its own deferred flush.
pub struct ViewContext<'a, M> {
    model: &'a M,
    frames: FrameRequester<'a>,
}

impl<'a, M> ViewContext<'a, M> {
    pub fn new(model: &'a M, queue: &'a mut DeferredQueue, owner: ViewId) -> Self {
        Self {
            model,
            frames: queue.requester(owner),
        }
    }

    pub fn model(&self) -> &'a M {
        self.model
    }

    pub fn owner(&self) -> ViewId {
        self.frames.owner()
    }

    pub fn frames(&mut self) -> &mut FrameRequester<'a> {
        &mut self.frames
    }
}

pub trait View<M, E> {
    fn name(&self) -> &'static str;
    fn subscriptions(&self) -> &'static [&'static str];
    fn attach(&mut self, cx: &mut ViewContext<'_, M>);
    fn handle_event(&mut self, event: &E, cx: &mut ViewContext<'_, M>);
    fn flush(&mut self, point: SyncPoint, cx: &mut ViewContext<'_, M>) -> FlushReport;
    fn detach(&mut self) {}
    fn debug_lines(&self) -> Vec<String> {
        Vec::new()
    }
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct ViewSlot<M, E> {
    view: Box<dyn View<M, E>>,
    name: &'static str,
    perf: PerfStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub flushed: Option<FlushReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostTotals {
    pub events: u64,
    pub flushes: u64,
    pub report: FlushReport,
}

#[derive(Debug, Clone)]
pub struct ViewOverlay {
    pub name: &'static str,
    pub perf: PerfStatsSnapshot,
    pub lines: Vec<String>,
}

/// Owns the attached views, routes events to subscribers and runs deferred
/// flushes when the loop reaches a sync point.
pub struct ViewHost<M, E> {
    slots: Vec<Option<ViewSlot<M, E>>>,
    bus: EventBus,
    deferred: DeferredQueue,
    totals: HostTotals,
}

impl<M, E> Default for ViewHost<M, E> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            bus: EventBus::new(),
            deferred: DeferredQueue::new(),
            totals: HostTotals::default(),
        }
    }
}

impl<M, E: HostEvent> ViewHost<M, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, mut view: Box<dyn View<M, E>>, model: &M) -> ViewId {
        let id = ViewId(self.slots.len() as u32);
        let name = view.name();
        let subscriptions = view.subscriptions();
        for event in subscriptions {
            self.bus.subscribe(*event, id);
        }

        let mut cx = ViewContext::new(model, &mut self.deferred, id);
        view.attach(&mut cx);
        info!(
            view = name,
            view_id = %id,
            subscriptions = subscriptions.len(),
            "view_attached"
        );

        self.slots.push(Some(ViewSlot {
            view,
            name,
            perf: PerfStats::new(),
        }));
        id
    }

    pub fn detach(&mut self, id: ViewId) -> bool {
        let Some(mut slot) = self.slots.get_mut(id.0 as usize).and_then(Option::take) else {
            return false;
        };
        self.bus.unsubscribe_all(id);
        self.deferred.cancel_owner(id);
        slot.view.detach();
        info!(view = slot.name, view_id = %id, "view_detached");
        true
    }

    pub fn dispatch(&mut self, event: &E, model: &M) -> DispatchReport {
        self.totals.events = self.totals.events.saturating_add(1);
        let subscribers = self.bus.subscribers(event.name()).to_vec();
        if subscribers.is_empty() {
            trace!(event = event.name(), "event_without_subscribers");
        }

        let mut delivered = 0usize;
        for id in subscribers {
            let Some(slot) = self.slots.get_mut(id.0 as usize).and_then(Option::as_mut) else {
                continue;
            };
            let started = Instant::now();
            let mut cx = ViewContext::new(model, &mut self.deferred, id);
            slot.view.handle_event(event, &mut cx);
            slot.perf.record_event(started.elapsed());
            delivered += 1;
        }

        let flushed = event
            .completes_batch()
            .then(|| self.run_sync_point(SyncPoint::BatchComplete, model));

        DispatchReport { delivered, flushed }
    }

    pub fn run_sync_point(&mut self, point: SyncPoint, model: &M) -> FlushReport {
        let due = self.deferred.take_due(point);
        let mut total = FlushReport::default();
        for id in due {
            let Some(slot) = self.slots.get_mut(id.0 as usize).and_then(Option::as_mut) else {
                debug!(view_id = %id, "flush_for_detached_view_ignored");
                continue;
            };
            let started = Instant::now();
            let mut cx = ViewContext::new(model, &mut self.deferred, id);
            let report = slot.view.flush(point, &mut cx);
            slot.perf.record_flush(started.elapsed());
            debug!(
                view = slot.name,
                sync_point = point.label(),
                keys = report.keys,
                applied = report.applied,
                failed = report.failed,
                "view_flushed"
            );
            total.merge(&report);
            self.totals.flushes = self.totals.flushes.saturating_add(1);
        }
        self.totals.report.merge(&total);
        total
    }

    pub fn run_frame(&mut self, model: &M) -> FlushReport {
        self.run_sync_point(SyncPoint::NextFrame, model)
    }

    /// Runs `f` against the concrete view behind `id` with a live context,
    /// for calls that come from outside the event stream (clicks, hotkeys).
    pub fn with_view_mut<T, R>(
        &mut self,
        id: ViewId,
        model: &M,
        f: impl FnOnce(&mut T, &mut ViewContext<'_, M>) -> R,
    ) -> Option<R>
    where
        T: 'static,
    {
        let slot = self.slots.get_mut(id.0 as usize).and_then(Option::as_mut)?;
        let view = slot.view.as_any_mut().downcast_mut::<T>()?;
        let mut cx = ViewContext::new(model, &mut self.deferred, id);
        Some(f(view, &mut cx))
    }

    pub fn view<T: 'static>(&self, id: ViewId) -> Option<&T> {
        self.slots
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .and_then(|slot| slot.view.as_any().downcast_ref::<T>())
    }

    pub fn has_pending(&self) -> bool {
        !self.deferred.is_empty()
    }

    pub fn pending(&self, point: SyncPoint) -> usize {
        self.deferred.pending(point)
    }

    pub fn view_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn subscription_count(&self) -> usize {
        self.bus.subscription_count()
    }

    pub fn totals(&self) -> HostTotals {
        self.totals
    }

    pub fn overlay_views(&self) -> Vec<ViewOverlay> {
        self.slots
            .iter()
            .flatten()
            .map(|slot| ViewOverlay {
                name: slot.name,
                perf: slot.perf.snapshot(),
                lines: slot.view.debug_lines(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::scheduler::{EntityRegistry, Recompute, Redraw};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestEvent {
        Touch(u32),
        Unknown(u32),
        Drop(u32),
        BatchDone,
    }

    impl HostEvent for TestEvent {
        fn name(&self) -> &'static str {
            match self {
                Self::Touch(_) => "Touch",
                Self::Unknown(_) => "Unknown",
                Self::Drop(_) => "Drop",
                Self::BatchDone => "BatchDone",
            }
        }

        fn completes_batch(&self) -> bool {
            matches!(self, Self::BatchDone)
        }
    }

    #[derive(Default)]
    struct Counters {
        values: std::collections::BTreeMap<u32, u32>,
    }

    struct CountingView {
        registry: EntityRegistry<u32, u32>,
        recomputed: Vec<u32>,
        rearm_once: Option<u32>,
        detached: bool,
    }

    impl CountingView {
        fn new(point: SyncPoint) -> Self {
            Self {
                registry: EntityRegistry::new(point),
                recomputed: Vec::new(),
                rearm_once: None,
                detached: false,
            }
        }
    }

    impl View<Counters, TestEvent> for CountingView {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn subscriptions(&self) -> &'static [&'static str] {
            &["Touch", "Unknown", "Drop", "BatchDone"]
        }

        fn attach(&mut self, cx: &mut ViewContext<'_, Counters>) {
            for key in cx.model().values.keys() {
                self.registry.register(*key, 0);
            }
        }

        fn handle_event(&mut self, event: &TestEvent, cx: &mut ViewContext<'_, Counters>) {
            match *event {
                TestEvent::Touch(key) | TestEvent::Unknown(key) => {
                    self.registry.mark_dirty(key, Redraw, cx.frames());
                }
                TestEvent::Drop(key) => {
                    self.registry.unregister(&key);
                }
                TestEvent::BatchDone => {}
            }
        }

        fn flush(&mut self, _point: SyncPoint, cx: &mut ViewContext<'_, Counters>) -> FlushReport {
            let model = cx.model();
            let batch = self.registry.take_batch();
            batch.run(|key, _| {
                let Some(fresh) = model.values.get(&key).copied() else {
                    return Ok::<_, String>(Recompute::Skipped);
                };
                let Some(applied) = self.registry.get_mut(&key) else {
                    return Ok(Recompute::Skipped);
                };
                *applied = fresh;
                self.recomputed.push(key);
                if self.rearm_once == Some(key) {
                    self.rearm_once = None;
                    self.registry.mark_dirty(key, Redraw, cx.frames());
                }
                Ok(Recompute::Applied)
            })
        }

        fn detach(&mut self) {
            self.detached = true;
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn model_with(keys: &[(u32, u32)]) -> Counters {
        Counters {
            values: keys.iter().copied().collect(),
        }
    }

    #[test]
    fn burst_of_events_yields_one_recompute_per_key() {
        let model = model_with(&[(1, 10), (2, 20)]);
        let mut host: ViewHost<Counters, TestEvent> = ViewHost::new();
        let id = host.attach(Box::new(CountingView::new(SyncPoint::NextFrame)), &model);

        for _ in 0..5 {
            host.dispatch(&TestEvent::Touch(1), &model);
        }
        host.dispatch(&TestEvent::Touch(2), &model);
        assert_eq!(host.pending(SyncPoint::NextFrame), 1);

        let report = host.run_frame(&model);

        assert_eq!(report.applied, 2);
        let view = host.view::<CountingView>(id).expect("view");
        assert_eq!(view.recomputed, vec![1, 2]);
        assert_eq!(view.registry.get(&1), Some(&10));
        assert!(!host.has_pending());
    }

    #[test]
    fn batch_complete_event_flushes_batch_views_immediately() {
        let model = model_with(&[(3, 30)]);
        let mut host: ViewHost<Counters, TestEvent> = ViewHost::new();
        let id = host.attach(Box::new(CountingView::new(SyncPoint::BatchComplete)), &model);

        host.dispatch(&TestEvent::Touch(3), &model);
        assert!(host.run_frame(&model).keys == 0, "not due at frame time");

        let report = host.dispatch(&TestEvent::BatchDone, &model);

        assert_eq!(report.flushed.map(|flushed| flushed.applied), Some(1));
        assert_eq!(host.view::<CountingView>(id).expect("view").recomputed, vec![3]);
    }

    #[test]
    fn unknown_key_is_skipped_without_error() {
        let model = model_with(&[(1, 10)]);
        let mut host: ViewHost<Counters, TestEvent> = ViewHost::new();
        host.attach(Box::new(CountingView::new(SyncPoint::NextFrame)), &model);

        host.dispatch(&TestEvent::Unknown(404), &model);
        let report = host.run_frame(&model);

        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn unregister_between_mark_and_flush_prevents_recompute() {
        let model = model_with(&[(1, 10), (2, 20)]);
        let mut host: ViewHost<Counters, TestEvent> = ViewHost::new();
        let id = host.attach(Box::new(CountingView::new(SyncPoint::NextFrame)), &model);

        host.dispatch(&TestEvent::Touch(1), &model);
        host.dispatch(&TestEvent::Touch(2), &model);
        host.dispatch(&TestEvent::Drop(1), &model);
        host.run_frame(&model);

        assert_eq!(host.view::<CountingView>(id).expect("view").recomputed, vec![2]);
    }

    #[test]
    fn mark_during_flush_runs_on_following_frame() {
        let model = model_with(&[(1, 10)]);
        let mut host: ViewHost<Counters, TestEvent> = ViewHost::new();
        let mut view = CountingView::new(SyncPoint::NextFrame);
        view.rearm_once = Some(1);
        let id = host.attach(Box::new(view), &model);

        host.dispatch(&TestEvent::Touch(1), &model);
        host.run_frame(&model);
        assert_eq!(host.pending(SyncPoint::NextFrame), 1);

        host.run_frame(&model);
        assert_eq!(host.view::<CountingView>(id).expect("view").recomputed, vec![1, 1]);
        assert!(!host.has_pending());
    }

    #[test]
    fn detach_drops_subscriptions_and_pending_flushes() {
        let model = model_with(&[(1, 10)]);
        let mut host: ViewHost<Counters, TestEvent> = ViewHost::new();
        let id = host.attach(Box::new(CountingView::new(SyncPoint::NextFrame)), &model);
        host.dispatch(&TestEvent::Touch(1), &model);

        assert!(host.detach(id));
        assert!(!host.detach(id));

        let report = host.dispatch(&TestEvent::Touch(1), &model);
        assert_eq!(report.delivered, 0);
        assert!(!host.has_pending());
        assert_eq!(host.subscription_count(), 0);
        assert_eq!(host.view_count(), 0);
    }

    #[test]
    fn with_view_mut_can_schedule_work() {
        let model = model_with(&[(5, 50)]);
        let mut host: ViewHost<Counters, TestEvent> = ViewHost::new();
        let id = host.attach(Box::new(CountingView::new(SyncPoint::NextFrame)), &model);

        let scheduled = host
            .with_view_mut::<CountingView, _>(id, &model, |view, cx| {
                view.registry.mark_dirty(5, Redraw, cx.frames())
            })
            .expect("view present");

        assert!(scheduled);
        assert_eq!(host.run_frame(&model).applied, 1);
    }
}
