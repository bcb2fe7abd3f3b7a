use std::time::Instant;

/// Sound output used by playback and previews.
///
/// Calls are fire-and-forget. An implementation that cannot play a note (for
/// example a missing sample) logs the problem and returns normally.
pub trait AudioService {
    /// `string_index` is the 0-based grid row (0 = high e).
    fn play(&mut self, string_index: u8, fret: u8, duration_secs: f64);
}

/// Discards every note. Used when no output device is wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

impl AudioService for SilentAudio {
    fn play(&mut self, string_index: u8, fret: u8, duration_secs: f64) {
        log::trace!("silent: string {string_index} fret {fret} for {duration_secs:.2}s");
    }
}

/// Monotonic millisecond time source.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Milliseconds since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}
