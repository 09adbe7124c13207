//! Refresh scheduling.
//!
//! The grid never runs a refresh pass from inside the call that requested it
//! unless the request is immediate. Non-immediate requests arm a debounce
//! deadline; a later request replaces the deadline instead of queueing a
//! second pass. Scroll repositioning is coalesced separately into at most one
//! pass per animation frame.
//!
//! Time comes from a [`Clock`] so the debounce can be driven by hand in
//! tests.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
///
/// ```
/// use livegrid::scheduler::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let handle = clock.clone();
/// let start = clock.now();
/// handle.advance(Duration::from_millis(30));
/// assert_eq!(clock.now() - start, Duration::from_millis(30));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Debounce and frame bookkeeping for refresh passes.
#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    debounce: Duration,
    due: Option<Instant>,
    frame_requested: bool,
}

impl RefreshScheduler {
    pub fn new(debounce: Duration) -> Self {
        RefreshScheduler {
            debounce,
            due: None,
            frame_requested: false,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Request a refresh pass. Returns true when the caller must run the pass
    /// right now; any pending debounced pass is absorbed into it.
    pub fn request(&mut self, now: Instant, immediate: bool) -> bool {
        if immediate || self.debounce.is_zero() {
            self.due = None;
            return true;
        }
        self.due = Some(now + self.debounce);
        false
    }

    /// True once when a debounced pass has come due.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    pub fn due(&self) -> Option<Instant> {
        self.due
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }

    /// Ask for a reposition on the next frame. Repeated requests before the
    /// frame collapse into one.
    pub fn request_frame(&mut self) {
        self.frame_requested = true;
    }

    /// Consume the frame request, if any.
    pub fn take_frame(&mut self) -> bool {
        std::mem::take(&mut self.frame_requested)
    }

    pub fn frame_requested(&self) -> bool {
        self.frame_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_request_runs_now() {
        let clock = ManualClock::new();
        let mut scheduler = RefreshScheduler::new(Duration::from_millis(50));
        assert!(!scheduler.request(clock.now(), false));
        assert!(scheduler.is_pending());
        assert!(scheduler.request(clock.now(), true));
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn test_requests_within_window_coalesce() {
        let clock = ManualClock::new();
        let mut scheduler = RefreshScheduler::new(Duration::from_millis(50));
        scheduler.request(clock.now(), false);
        clock.advance(Duration::from_millis(30));
        // Replaces the pending deadline.
        scheduler.request(clock.now(), false);
        clock.advance(Duration::from_millis(30));
        assert!(!scheduler.poll(clock.now()));
        clock.advance(Duration::from_millis(20));
        assert!(scheduler.poll(clock.now()));
        assert!(!scheduler.poll(clock.now()));
    }

    #[test]
    fn test_zero_debounce_is_always_immediate() {
        let mut scheduler = RefreshScheduler::new(Duration::ZERO);
        assert!(scheduler.request(Instant::now(), false));
    }

    #[test]
    fn test_frame_requests_collapse() {
        let mut scheduler = RefreshScheduler::new(Duration::from_millis(50));
        scheduler.request_frame();
        scheduler.request_frame();
        assert!(scheduler.take_frame());
        assert!(!scheduler.take_frame());
    }
}
