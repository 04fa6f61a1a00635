use std::collections::VecDeque;
use std::env;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::deferred::SyncPoint;
use super::events::HostEvent;
use super::host::{HostTotals, ViewHost};
use super::metrics::{MetricsAccumulator, MetricsHandle};

pub const MAX_FRAMES_ENV_VAR: &str = "MATCHHUD_MAX_FRAMES";

const DEFAULT_MAX_EVENTS_PER_FRAME: usize = 256;
const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_fps: Option<u32>,
    pub max_frames: u64,
    pub max_events_per_frame: usize,
    pub metrics_log_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_fps: None,
            max_frames: 10_000,
            max_events_per_frame: DEFAULT_MAX_EVENTS_PER_FRAME,
            metrics_log_interval: DEFAULT_METRICS_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    Running,
    Finished,
}

/// Feeds the loop: mutates the model and queues the events produced during
/// one frame.
pub trait FrameDriver<M, E> {
    fn poll(&mut self, frame: u64, model: &mut M, events: &mut Vec<E>) -> DriverStatus;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames: u64,
    pub events: u64,
    pub deferred_events: u64,
    pub completed: bool,
    pub totals: HostTotals,
}

pub fn run_loop<M, E, D>(
    config: &LoopConfig,
    host: &mut ViewHost<M, E>,
    model: &mut M,
    driver: &mut D,
    metrics: &MetricsHandle,
) -> LoopSummary
where
    E: HostEvent,
    D: FrameDriver<M, E>,
{
    let max_frames = resolve_max_frames(config.max_frames);
    let event_budget = normalize_event_budget(config.max_events_per_frame);
    let interval = normalize_non_zero_duration(config.metrics_log_interval, DEFAULT_METRICS_INTERVAL);
    let fps_cap = normalize_fps_cap(config.target_fps);
    let frame_target = target_frame_duration(fps_cap);
    info!(
        max_frames,
        event_budget,
        target_fps = %format_fps_cap(fps_cap),
        views = host.view_count(),
        "loop_started"
    );

    let mut accumulator = MetricsAccumulator::new(interval);
    let mut backlog = VecDeque::<E>::new();
    let mut incoming = Vec::<E>::new();
    let mut summary = LoopSummary::default();
    let mut driver_finished = false;

    for frame in 0..max_frames {
        let frame_start = Instant::now();

        if !driver_finished {
            if driver.poll(frame, model, &mut incoming) == DriverStatus::Finished {
                driver_finished = true;
                debug!(frame, "driver_finished");
            }
            backlog.extend(incoming.drain(..));
        }

        let plan = plan_event_budget(backlog.len(), event_budget);
        if plan.deferred > 0 {
            warn!(
                frame,
                dispatched = plan.dispatch,
                deferred = plan.deferred,
                "event_backlog_deferred"
            );
            summary.deferred_events = summary.deferred_events.saturating_add(plan.deferred as u64);
        }

        let keys_before = host.totals().report.keys;
        for event in backlog.drain(..plan.dispatch) {
            host.dispatch(&event, model);
        }
        summary.events = summary.events.saturating_add(plan.dispatch as u64);

        if driver_finished && backlog.is_empty() && host.pending(SyncPoint::BatchComplete) > 0 {
            debug!(frame, "draining_unterminated_batch");
            host.run_sync_point(SyncPoint::BatchComplete, model);
        }

        let flush_start = Instant::now();
        host.run_frame(model);
        let recomputes = host.totals().report.keys.saturating_sub(keys_before);
        accumulator.record_flush(recomputes, flush_start.elapsed());
        accumulator.record_events(plan.dispatch);
        accumulator.record_frame();
        summary.frames = frame + 1;

        if let Some(snapshot) = accumulator.maybe_snapshot(Instant::now()) {
            metrics.publish(snapshot);
            info!(
                fps = snapshot.fps,
                events_per_sec = snapshot.events_per_sec,
                recomputes_per_sec = snapshot.recomputes_per_sec,
                flush_ms = snapshot.flush_time_ms,
                "loop_metrics"
            );
        }

        if driver_finished && backlog.is_empty() && !host.has_pending() {
            summary.completed = true;
            break;
        }

        let sleep = compute_cap_sleep(frame_start.elapsed(), frame_target);
        if !sleep.is_zero() {
            thread::sleep(sleep);
        }
    }

    if !summary.completed {
        warn!(
            frames = summary.frames,
            backlog = backlog.len(),
            "loop_frame_cap_reached"
        );
    }

    summary.totals = host.totals();
    info!(
        frames = summary.frames,
        events = summary.events,
        recomputes = summary.totals.report.keys,
        failed = summary.totals.report.failed,
        completed = summary.completed,
        "loop_finished"
    );
    summary
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EventPlan {
    dispatch: usize,
    deferred: usize,
}

fn plan_event_budget(backlog: usize, budget: usize) -> EventPlan {
    let dispatch = backlog.min(budget);
    EventPlan {
        dispatch,
        deferred: backlog - dispatch,
    }
}

fn normalize_event_budget(budget: usize) -> usize {
    if budget == 0 {
        DEFAULT_MAX_EVENTS_PER_FRAME
    } else {
        budget
    }
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(fps_cap: Option<u32>) -> Option<Duration> {
    fps_cap.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_fps_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

fn resolve_max_frames(config_max_frames: u64) -> u64 {
    let fallback = config_max_frames.max(1);
    match env::var(MAX_FRAMES_ENV_VAR) {
        Ok(value) => match value.parse::<u64>() {
            Ok(frames) if frames > 0 => frames,
            _ => {
                warn!(
                    env_var = MAX_FRAMES_ENV_VAR,
                    value = value.as_str(),
                    "invalid max-frames env var value; falling back to config"
                );
                fallback
            }
        },
        Err(env::VarError::NotPresent) => fallback,
        Err(err) => {
            warn!(
                env_var = MAX_FRAMES_ENV_VAR,
                error = %err,
                "unable to read max-frames env var; falling back to config"
            );
            fallback
        }
    }
}
