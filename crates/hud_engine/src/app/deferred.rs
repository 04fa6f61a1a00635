use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u32);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// The host synchronization points a view may defer work to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPoint {
    NextFrame,
    BatchComplete,
}

impl SyncPoint {
    pub fn label(self) -> &'static str {
        match self {
            Self::NextFrame => "next_frame",
            Self::BatchComplete => "batch_complete",
        }
    }
}

#[derive(Debug, Default)]
pub struct DeferredQueue {
    next_frame: Vec<ViewId>,
    batch_complete: Vec<ViewId>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requester(&mut self, owner: ViewId) -> FrameRequester<'_> {
        FrameRequester { queue: self, owner }
    }

    pub fn request(&mut self, owner: ViewId, point: SyncPoint) {
        let pending = self.slot_mut(point);
        if !pending.contains(&owner) {
            pending.push(owner);
        }
    }

    pub fn take_due(&mut self, point: SyncPoint) -> Vec<ViewId> {
        std::mem::take(self.slot_mut(point))
    }

    pub fn cancel_owner(&mut self, owner: ViewId) {
        self.next_frame.retain(|id| *id != owner);
        self.batch_complete.retain(|id| *id != owner);
    }

    pub fn pending(&self, point: SyncPoint) -> usize {
        match point {
            SyncPoint::NextFrame => self.next_frame.len(),
            SyncPoint::BatchComplete => self.batch_complete.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.next_frame.is_empty() && self.batch_complete.is_empty()
    }

    fn slot_mut(&mut self, point: SyncPoint) -> &mut Vec<ViewId> {
        match point {
            SyncPoint::NextFrame => &mut self.next_frame,
            SyncPoint::BatchComplete => &mut self.batch_complete,
        }
    }
}

/// Handle a view uses to ask the host for a deferred flush of itself.
pub struct FrameRequester<'a> {
    queue: &'a mut DeferredQueue,
    owner: ViewId,
}

impl<'a> FrameRequester<'a> {
    pub fn owner(&self) -> ViewId {
        self.owner
    }

    pub fn request(&mut self, point: SyncPoint) {
        self.queue.request(self.owner, point);
    }
}

/// Schedule-once flag: armed by the first request, disarmed when the flush
/// fires or is cancelled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledFlush {
    armed: bool,
}

impl ScheduledFlush {
    /// Returns true only for the request that actually armed the flag.
    pub fn arm(&mut self) -> bool {
        if self.armed {
            return false;
        }
        self.armed = true;
        true
    }

    pub fn fire(&mut self) {
        self.armed = false;
    }

    pub fn cancel(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_arms_once_until_fired() {
        let mut flag = ScheduledFlush::default();
        assert!(flag.arm());
        assert!(!flag.arm());
        assert!(flag.is_armed());
        flag.fire();
        assert!(!flag.is_armed());
        assert!(flag.arm());
    }

    #[test]
    fn queue_dedups_requests_per_sync_point() {
        let mut queue = DeferredQueue::new();
        queue.request(ViewId(1), SyncPoint::NextFrame);
        queue.request(ViewId(1), SyncPoint::NextFrame);
        queue.request(ViewId(2), SyncPoint::NextFrame);
        queue.request(ViewId(1), SyncPoint::BatchComplete);

        assert_eq!(queue.pending(SyncPoint::NextFrame), 2);
        assert_eq!(queue.take_due(SyncPoint::NextFrame), vec![ViewId(1), ViewId(2)]);
        assert_eq!(queue.pending(SyncPoint::NextFrame), 0);
        assert_eq!(queue.pending(SyncPoint::BatchComplete), 1);
    }

    #[test]
    fn cancel_owner_removes_every_pending_request() {
        let mut queue = DeferredQueue::new();
        {
            let mut frames = queue.requester(ViewId(4));
            frames.request(SyncPoint::NextFrame);
            frames.request(SyncPoint::BatchComplete);
        }
        queue.request(ViewId(5), SyncPoint::NextFrame);

        queue.cancel_owner(ViewId(4));

        assert_eq!(queue.take_due(SyncPoint::NextFrame), vec![ViewId(5)]);
        assert!(queue.is_empty());
    }
}
