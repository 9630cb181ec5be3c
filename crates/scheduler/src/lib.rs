//! Cooperative, frame-synchronised scheduling for renderer cores.
//!
//! A [`FrameLoop`] behaves like a display-refresh callback queue: consumers
//! request a frame and receive a [`FrameHandle`], the host calls
//! [`FrameLoop::tick`] once per refresh and dispatches every handle that was
//! pending before the tick. Requests issued while dispatching land in the next
//! tick, so a consumer that re-arms itself from its own callback runs exactly
//! once per refresh.

mod pacer;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

pub use pacer::FramePacer;

/// Identifies one scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Minimal scheduling surface a renderer needs: arm one callback, cancel it.
pub trait FrameScheduler {
    /// Schedules a callback for the next frame tick.
    fn request_frame(&mut self) -> FrameHandle;
    /// Cancels a pending callback. Returns false when it already fired or was
    /// never scheduled.
    fn cancel_frame(&mut self, handle: FrameHandle) -> bool;
}

#[derive(Debug, Default)]
struct FrameQueue {
    next_id: u64,
    pending: BTreeSet<FrameHandle>,
    ticks: u64,
}

/// Shared single-threaded frame queue.
///
/// Clones refer to the same queue; hand one clone to every renderer that
/// should be driven by the same display refresh.
#[derive(Debug, Clone, Default)]
pub struct FrameLoop {
    queue: Rc<RefCell<FrameQueue>>,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the current refresh: drains and returns every pending handle in
    /// request order.
    pub fn tick(&self) -> Vec<FrameHandle> {
        let mut queue = self.queue.borrow_mut();
        queue.ticks = queue.ticks.saturating_add(1);
        let due: Vec<FrameHandle> = std::mem::take(&mut queue.pending).into_iter().collect();
        tracing::trace!(tick = queue.ticks, due = due.len(), "frame loop tick");
        due
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.borrow().pending.is_empty()
    }

    /// Number of ticks fired so far.
    pub fn ticks(&self) -> u64 {
        self.queue.borrow().ticks
    }
}

impl FrameScheduler for FrameLoop {
    fn request_frame(&mut self) -> FrameHandle {
        let mut queue = self.queue.borrow_mut();
        queue.next_id = queue.next_id.wrapping_add(1);
        let handle = FrameHandle(queue.next_id);
        queue.pending.insert(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) -> bool {
        self.queue.borrow_mut().pending.remove(&handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_drains_pending_requests_in_order() {
        let mut frames = FrameLoop::new();
        let first = frames.request_frame();
        let second = frames.request_frame();
        assert_eq!(frames.pending(), 2);

        let due = frames.tick();
        assert_eq!(due, vec![first, second]);
        assert!(!frames.has_pending());
        assert_eq!(frames.ticks(), 1);
    }

    #[test]
    fn requests_made_after_tick_wait_for_next_refresh() {
        let mut frames = FrameLoop::new();
        frames.request_frame();
        let due = frames.tick();
        assert_eq!(due.len(), 1);

        let rearmed = frames.request_frame();
        assert_eq!(frames.tick(), vec![rearmed]);
        assert!(frames.tick().is_empty());
    }

    #[test]
    fn cancelled_handles_never_fire() {
        let mut frames = FrameLoop::new();
        let handle = frames.request_frame();
        assert!(frames.cancel_frame(handle));
        assert!(!frames.cancel_frame(handle), "second cancel is a no-op");
        assert!(frames.tick().is_empty());
    }

    #[test]
    fn clones_share_one_queue() {
        let mut a = FrameLoop::new();
        let mut b = a.clone();
        let from_a = a.request_frame();
        let from_b = b.request_frame();
        assert_ne!(from_a, from_b);
        assert_eq!(a.tick(), vec![from_a, from_b]);
        assert_eq!(b.ticks(), 1);
    }
}
