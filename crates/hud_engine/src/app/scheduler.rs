use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use super::deferred::{FrameRequester, ScheduledFlush, SyncPoint};

/// Merge rule for two pending updates on the same key.
///
/// `coalesce` must be commutative and idempotent so the order in which
/// events arrive inside one batch never changes the flushed result.
pub trait Coalesce: Copy + fmt::Debug {
    fn coalesce(self, incoming: Self) -> Self;
}

/// The plain "something changed" update used by single-kind views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Redraw;

impl Coalesce for Redraw {
    fn coalesce(self, _incoming: Self) -> Self {
        Redraw
    }
}

/// Outcome of recomputing one key during a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recompute {
    /// Presentation was rewritten.
    Applied,
    /// Fresh state matched the last applied snapshot; nothing written.
    Unchanged,
    /// The key no longer resolves to a live entity.
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub keys: usize,
    pub applied: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl FlushReport {
    pub fn merge(&mut self, other: &FlushReport) {
        self.keys = self.keys.saturating_add(other.keys);
        self.applied = self.applied.saturating_add(other.applied);
        self.unchanged = self.unchanged.saturating_add(other.unchanged);
        self.skipped = self.skipped.saturating_add(other.skipped);
        self.failed = self.failed.saturating_add(other.failed);
    }

    pub fn record(&mut self, outcome: Recompute) {
        self.keys = self.keys.saturating_add(1);
        match outcome {
            Recompute::Applied => self.applied = self.applied.saturating_add(1),
            Recompute::Unchanged => self.unchanged = self.unchanged.saturating_add(1),
            Recompute::Skipped => self.skipped = self.skipped.saturating_add(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub marks: u64,
    pub coalesced: u64,
    pub flushes_requested: u64,
    pub batches: u64,
}

/// Coalesces dirty marks into one deferred flush per sync point.
///
/// Marking is idempotent per key; only the mark that arms the schedule-once
/// flag asks the host for a flush. Taking a batch clears the flag and the
/// dirty set before any recompute runs, so marks issued while a batch is
/// being processed land in the next flush.
#[derive(Debug)]
pub struct RedrawScheduler<K, U = Redraw> {
    dirty: BTreeMap<K, U>,
    flush: ScheduledFlush,
    sync_point: SyncPoint,
    stats: SchedulerStats,
}

impl<K, U> RedrawScheduler<K, U>
where
    K: Ord + Copy + fmt::Debug,
    U: Coalesce,
{
    pub fn new(sync_point: SyncPoint) -> Self {
        Self {
            dirty: BTreeMap::new(),
            flush: ScheduledFlush::default(),
            sync_point,
            stats: SchedulerStats::default(),
        }
    }

    /// Returns true when this call scheduled the flush.
    pub fn mark_dirty(&mut self, key: K, update: U, frames: &mut FrameRequester<'_>) -> bool {
        self.stats.marks = self.stats.marks.saturating_add(1);
        match self.dirty.entry(key) {
            Entry::Occupied(mut pending) => {
                let merged = pending.get().coalesce(update);
                pending.insert(merged);
                self.stats.coalesced = self.stats.coalesced.saturating_add(1);
            }
            Entry::Vacant(slot) => {
                slot.insert(update);
            }
        }

        if !self.flush.arm() {
            return false;
        }
        frames.request(self.sync_point);
        self.stats.flushes_requested = self.stats.flushes_requested.saturating_add(1);
        debug!(
            owner = %frames.owner(),
            sync_point = self.sync_point.label(),
            "redraw_flush_scheduled"
        );
        true
    }

    pub fn cancel(&mut self, key: &K) -> Option<U> {
        self.dirty.remove(key)
    }

    pub fn is_dirty(&self, key: &K) -> bool {
        self.dirty.contains_key(key)
    }

    pub fn pending(&self, key: &K) -> Option<U> {
        self.dirty.get(key).copied()
    }

    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    pub fn is_flush_scheduled(&self) -> bool {
        self.flush.is_armed()
    }

    pub fn sync_point(&self) -> SyncPoint {
        self.sync_point
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn take_batch(&mut self) -> DirtyBatch<K, U> {
        self.flush.fire();
        self.stats.batches = self.stats.batches.saturating_add(1);
        DirtyBatch {
            entries: std::mem::take(&mut self.dirty),
        }
    }

    /// Drops every pending mark and disarms the flag. A flush already queued
    /// with the host will find an empty batch.
    pub fn clear(&mut self) {
        self.dirty.clear();
        self.flush.cancel();
    }
}

/// Dirty keys taken out of a scheduler for one flush.
#[derive(Debug)]
pub struct DirtyBatch<K, U = Redraw> {
    entries: BTreeMap<K, U>,
}

impl<K, U> DirtyBatch<K, U>
where
    K: Ord + Copy + fmt::Debug,
    U: Coalesce,
{
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.keys().copied()
    }

    /// Runs `recompute` once per key. A failing key is logged and counted;
    /// the remaining keys still run and nothing is re-queued.
    pub fn run<E, F>(self, mut recompute: F) -> FlushReport
    where
        E: fmt::Display,
        F: FnMut(K, U) -> Result<Recompute, E>,
    {
        let mut report = FlushReport::default();
        for (key, update) in self.entries {
            match recompute(key, update) {
                Ok(outcome) => report.record(outcome),
                Err(err) => {
                    report.keys = report.keys.saturating_add(1);
                    report.failed = report.failed.saturating_add(1);
                    warn!(key = ?key, update = ?update, error = %err, "recompute_failed");
                }
            }
        }
        report
    }
}

/// A scheduler plus the per-entity view state it redraws.
///
/// Unregistering removes both the entity and any pending dirty mark, so a
/// later flush never sees the key. Keys marked without being registered are
/// still flushed; recompute callbacks resolve them through [`Self::get`] and
/// skip the ones that are gone.
#[derive(Debug)]
pub struct EntityRegistry<K, S, U = Redraw> {
    scheduler: RedrawScheduler<K, U>,
    entities: BTreeMap<K, S>,
}

impl<K, S, U> EntityRegistry<K, S, U>
where
    K: Ord + Copy + fmt::Debug,
    U: Coalesce,
{
    pub fn new(sync_point: SyncPoint) -> Self {
        Self {
            scheduler: RedrawScheduler::new(sync_point),
            entities: BTreeMap::new(),
        }
    }

    /// Returns the previous state when `key` was already registered.
    pub fn register(&mut self, key: K, state: S) -> Option<S> {
        self.entities.insert(key, state)
    }

    pub fn unregister(&mut self, key: &K) -> Option<S> {
        self.scheduler.cancel(key);
        self.entities.remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entities.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&S> {
        self.entities.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut S> {
        self.entities.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.entities.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &S)> {
        self.entities.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut S)> {
        self.entities.iter_mut()
    }

    pub fn mark_dirty(&mut self, key: K, update: U, frames: &mut FrameRequester<'_>) -> bool {
        self.scheduler.mark_dirty(key, update, frames)
    }

    pub fn take_batch(&mut self) -> DirtyBatch<K, U> {
        self.scheduler.take_batch()
    }

    pub fn scheduler(&self) -> &RedrawScheduler<K, U> {
        &self.scheduler
    }

    /// Drops every entity and pending mark, returning the removed states.
    pub fn clear(&mut self) -> Vec<(K, S)> {
        self.scheduler.clear();
        std::mem::take(&mut self.entities).into_iter().collect()
    }
}
