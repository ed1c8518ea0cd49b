//! Redraw-driven scheduling and the session clock.

use std::time::Instant;

/// Identifies one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(u64);

/// One-shot "run before the next redraw" slot.
///
/// A request stays pending until the host's next redraw takes it with
/// [`FrameScheduler::take_due`]. A cancelled token is never handed out, so a
/// consumer that cancels synchronously cannot be called back afterwards.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    next_id: u64,
    pending: Option<FrameToken>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a callback before the next redraw, replacing any pending one.
    pub fn request(&mut self) -> FrameToken {
        self.next_id += 1;
        let token = FrameToken(self.next_id);
        self.pending = Some(token);
        token
    }

    /// Drops `token` if it is still pending.
    pub fn cancel(&mut self, token: FrameToken) {
        if self.pending == Some(token) {
            self.pending = None;
        }
    }

    /// Called by the host once per redraw; yields the callback due now.
    pub fn take_due(&mut self) -> Option<FrameToken> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Millisecond time source for history timestamps.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Monotonic clock whose epoch is its own creation.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
