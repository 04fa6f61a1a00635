use std::collections::VecDeque;
use std::time::Duration;

pub(crate) const PERF_WINDOW_LEN: usize = 120;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RollingMsStats {
    pub last_ms: f32,
    pub avg_ms: f32,
    pub max_ms: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerfStatsSnapshot {
    pub event: RollingMsStats,
    pub flush: RollingMsStats,
}

/// Rolling timings for one view: event handling and deferred flushes.
#[derive(Debug, Default)]
pub struct PerfStats {
    event: RollingWindowMs,
    flush: RollingWindowMs,
}

impl PerfStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&mut self, duration: Duration) {
        self.event.push_ms(duration_to_ms(duration));
    }

    pub fn record_flush(&mut self, duration: Duration) {
        self.flush.push_ms(duration_to_ms(duration));
    }

    pub fn snapshot(&self) -> PerfStatsSnapshot {
        PerfStatsSnapshot {
            event: self.event.snapshot(),
            flush: self.flush.snapshot(),
        }
    }
}

/// Last `PERF_WINDOW_LEN` samples in milliseconds, oldest first.
#[derive(Debug)]
struct RollingWindowMs {
    samples: VecDeque<f32>,
    sum_ms: f32,
}

impl Default for RollingWindowMs {
    fn default() -> Self {
        Self {
            samples: VecDeque::with_capacity(PERF_WINDOW_LEN),
            sum_ms: 0.0,
        }
    }
}

impl RollingWindowMs {
    fn push_ms(&mut self, value_ms: f32) {
        if self.samples.len() == PERF_WINDOW_LEN {
            if let Some(evicted) = self.samples.pop_front() {
                self.sum_ms -= evicted;
            }
        }
        self.samples.push_back(value_ms);
        self.sum_ms += value_ms;
    }

    fn snapshot(&self) -> RollingMsStats {
        let Some(&last_ms) = self.samples.back() else {
            return RollingMsStats::default();
        };
        RollingMsStats {
            last_ms,
            avg_ms: self.sum_ms / self.samples.len() as f32,
            max_ms: self.samples.iter().copied().fold(f32::MIN, f32::max),
        }
    }
}

fn duration_to_ms(duration: Duration) -> f32 {
    duration.as_secs_f32() * 1000.0
}
