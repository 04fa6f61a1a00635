use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LockResult, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static POISON_REPORTED: AtomicBool = AtomicBool::new(false);

/// Takes the guard even from a poisoned lock; the snapshot is plain data.
fn tolerate_poison<G>(result: LockResult<G>, operation: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        if !POISON_REPORTED.swap(true, Ordering::Relaxed) {
            warn!(operation, "metrics_lock_poisoned");
        }
        poisoned.into_inner()
    })
}

/// Rates over the last completed metrics interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub events_per_sec: f32,
    pub recomputes_per_sec: f32,
    pub flush_time_ms: f32,
}

/// Shared view of the latest snapshot, readable from any thread.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        *tolerate_poison(self.latest.read(), "read")
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        *tolerate_poison(self.latest.write(), "write") = snapshot;
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    frames: u32,
    events: u32,
    recomputes: u32,
    flushes: u32,
    flush_time_sum: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    fn starting_at(interval_start: Instant, interval: Duration) -> Self {
        Self {
            interval_start,
            interval,
            frames: 0,
            events: 0,
            recomputes: 0,
            flushes: 0,
            flush_time_sum: Duration::ZERO,
        }
    }

    pub(crate) fn record_frame(&mut self) {
        self.frames = self.frames.saturating_add(1);
    }

    pub(crate) fn record_events(&mut self, count: usize) {
        self.events = self.events.saturating_add(clamp_count(count));
    }

    pub(crate) fn record_flush(&mut self, recomputes: usize, duration: Duration) {
        self.recomputes = self.recomputes.saturating_add(clamp_count(recomputes));
        self.flushes = self.flushes.saturating_add(1);
        self.flush_time_sum = self.flush_time_sum.saturating_add(duration);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let flush_time_ms = if self.flushes == 0 {
            0.0
        } else {
            (self.flush_time_sum.as_secs_f32() / self.flushes as f32) * 1000.0
        };

        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            events_per_sec: self.events as f32 / elapsed_seconds,
            recomputes_per_sec: self.recomputes as f32 / elapsed_seconds,
            flush_time_ms,
        };

        *self = Self::starting_at(now, self.interval);
        Some(snapshot)
    }
}

fn clamp_count(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;
    use std::thread;

    use super::*;

    fn poison_lock(lock: &RwLock<LoopMetricsSnapshot>) {
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = lock.write().expect("write guard");
                    panic!("poison metrics lock");
                })
                .join();
        });
    }

    #[test]
    fn snapshot_computes_rates_over_interval() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::starting_at(base, Duration::from_secs(1));

        accumulator.record_frame();
        accumulator.record_frame();
        accumulator.record_events(6);
        accumulator.record_flush(3, Duration::from_millis(2));
        accumulator.record_flush(1, Duration::from_millis(4));

        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(2))
            .expect("snapshot should be emitted");

        assert!((snapshot.fps - 1.0).abs() < 0.01);
        assert!((snapshot.events_per_sec - 3.0).abs() < 0.01);
        assert!((snapshot.recomputes_per_sec - 2.0).abs() < 0.01);
        assert!((snapshot.flush_time_ms - 3.0).abs() < 0.001);
    }

    #[test]
    fn oversized_counts_saturate_instead_of_wrapping() {
        let mut accumulator = MetricsAccumulator::starting_at(Instant::now(), Duration::ZERO);

        accumulator.record_events(usize::MAX);
        accumulator.record_events(1);
        accumulator.record_flush(usize::MAX, Duration::ZERO);

        assert_eq!(accumulator.events, u32::MAX);
        assert_eq!(accumulator.recomputes, u32::MAX);
        assert_eq!(accumulator.flushes, 1);
    }

    #[test]
    fn snapshot_not_emitted_before_interval() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::starting_at(base, Duration::from_secs(1));
        accumulator.record_frame();

        assert!(accumulator
            .maybe_snapshot(base + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn snapshot_resets_counters() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::starting_at(base, Duration::from_secs(1));
        accumulator.record_events(10);
        accumulator.maybe_snapshot(base + Duration::from_secs(1));

        let next = accumulator
            .maybe_snapshot(base + Duration::from_secs(2))
            .expect("second snapshot");
        assert_eq!(next.events_per_sec, 0.0);
    }

    #[test]
    fn snapshot_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.latest.as_ref());

        assert_eq!(handle.snapshot(), LoopMetricsSnapshot::default());
    }

    #[test]
    fn publish_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.latest.as_ref());

        let expected = LoopMetricsSnapshot {
            fps: 15.0,
            events_per_sec: 60.0,
            recomputes_per_sec: 11.0,
            flush_time_ms: 0.5,
        };
        handle.publish(expected);

        assert_eq!(handle.snapshot(), expected);
    }
}
