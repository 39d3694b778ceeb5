//! Transport clock bookkeeping.
//!
//! Elapsed time is derived from the backend clock passed in by the caller,
//! never from wall-clock timers.

#[derive(Debug, Clone, Default)]
pub(crate) struct Transport {
    is_playing: bool,
    clock_origin: f64,
    paused_offset: f64,
}

impl Transport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub(crate) fn paused_offset(&self) -> f64 {
        self.paused_offset
    }

    /// Begin playing from the paused offset, anchored at `now`.
    pub(crate) fn start(&mut self, now: f64) {
        self.clock_origin = now - self.paused_offset;
        self.is_playing = true;
    }

    /// Freeze elapsed time at `now`.
    pub(crate) fn pause(&mut self, now: f64) {
        if self.is_playing {
            self.paused_offset = (now - self.clock_origin).max(0.0);
            self.is_playing = false;
        }
    }

    pub(crate) fn stop(&mut self) {
        self.is_playing = false;
        self.paused_offset = 0.0;
    }

    /// Only valid while not playing.
    pub(crate) fn set_offset(&mut self, offset: f64) {
        self.paused_offset = offset.max(0.0);
    }

    pub(crate) fn elapsed(&self, now: f64) -> f64 {
        if self.is_playing {
            (now - self.clock_origin).max(0.0)
        } else {
            self.paused_offset
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }
}
