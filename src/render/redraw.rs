//! Coalesced redraw requests

use std::time::{Duration, Instant};

/// At most one pending redraw per display refresh.
///
/// Any number of [`RedrawScheduler::post`] calls between two refresh ticks
/// collapse into a single draw.
#[derive(Debug, Default)]
pub struct RedrawScheduler {
    /// Time of the first request since the last draw; `Some` means pending
    requested_at: Option<Instant>,
    frames: u64,
}

impl RedrawScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a redraw pending. Returns `true` when this is the first request
    /// since the last draw, i.e. the host should request a refresh callback.
    pub fn post(&mut self) -> bool {
        if self.requested_at.is_some() {
            return false;
        }
        self.requested_at = Some(Instant::now());
        true
    }

    pub fn is_pending(&self) -> bool {
        self.requested_at.is_some()
    }

    /// Consume the pending request at a refresh tick. Returns how long the
    /// request waited, or `None` if nothing was pending.
    pub fn take(&mut self) -> Option<Duration> {
        let requested = self.requested_at.take()?;
        self.frames += 1;
        Some(requested.elapsed())
    }

    /// Number of redraws executed so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}
