//! Decides when the host should redraw.
//!
//! Two independent signals feed the host's tick:
//!
//! - a pending flag, raised by engine callbacks and input handlers and
//!   consumed with test-and-clear, so any number of raises between two ticks
//!   collapse into one redraw;
//! - a forced-frame counter, armed for a duration after events whose settling
//!   (tile fade-in, transition tails) does not raise fresh callbacks every
//!   frame.
//!
//! Both may be touched from engine worker threads while the host thread is
//! mid-tick, so they are plain atomics.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Frame interval the forced-frame counter is expressed in.
pub const FRAME_INTERVAL_MS: u32 = 16;

/// Repaint flag plus forced-frame counter.
#[derive(Debug, Default)]
pub struct RepaintScheduler {
    needs_repaint: AtomicBool,
    forced_frames: AtomicU32,
}

impl RepaintScheduler {
    /// An idle scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a repaint as pending.
    pub fn request(&self) {
        self.needs_repaint.store(true, Ordering::SeqCst);
    }

    /// Consume the pending repaint, if any.
    pub fn take(&self) -> bool {
        self.needs_repaint.swap(false, Ordering::SeqCst)
    }

    /// Whether a repaint is pending, without consuming it.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.needs_repaint.load(Ordering::SeqCst)
    }

    /// Keep redrawing for at least `ms` milliseconds.
    ///
    /// Raises the counter to `max(1, ceil(ms / 16))` frames; a shorter
    /// request never lowers a longer one already outstanding.
    pub fn arm_ms(&self, ms: u32) {
        let frames = ms.div_ceil(FRAME_INTERVAL_MS).max(1);
        self.forced_frames.fetch_max(frames, Ordering::SeqCst);
    }

    /// Spend one forced frame. Returns `false` once the burst is exhausted.
    pub fn consume_forced(&self) -> bool {
        self.forced_frames
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Forced frames still outstanding.
    #[must_use]
    pub fn forced_frames(&self) -> u32 {
        self.forced_frames.load(Ordering::SeqCst)
    }
}
