use serde::{Deserialize, Serialize};

/// Length of one beat at 1× speed before the internal speed scale is applied.
pub const BASE_BEAT_MS: f64 = 600.0;

/// The displayed speed label is multiplied by this to get the internal speed.
pub const SPEED_SCALE: f64 = 2.4;

/// Play-head lag behind the audio, at internal speed 1.
pub const VISUAL_LAG_MS: f64 = 100.0;

/// How early a looping pass ends, at internal speed 1.
pub const LOOP_EARLY_MS: f64 = 70.0;

/// Press duration that turns a click into a drag.
pub const HOLD_DELAY_MS: f64 = 200.0;

/// Fixed gap between strings when auditioning a chord entry.
pub const CHORD_PREVIEW_GAP_MS: f64 = 60.0;

pub const SPEED_OPTIONS: [f64; 12] = [
    0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0, 2.25, 2.5, 2.75, 3.0,
];
pub const SUSTAIN_OPTIONS: [f64; 4] = [0.5, 1.0, 2.0, 4.0];
pub const STRUM_OPTIONS: [f64; 9] = [0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 80.0, 100.0];
pub const NOTE_LENGTH_OPTIONS: [u32; 4] = [1, 2, 4, 8];
pub const ZOOM_OPTIONS: [f64; 5] = [0.2, 0.3, 0.5, 0.75, 1.0];

/// Zoom level shown to the user as 100%.
pub const ZOOM_BASE: f64 = 0.5;

/// User-adjustable playback and editing options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Speed as displayed, e.g. `1.0` for "1×".
    pub speed: f64,
    pub sustain_secs: f64,
    pub strum_ms: f64,
    pub looping: bool,
    /// Duration in beats given to notes inserted from the fretboard.
    pub note_length: u32,
    pub zoom: f64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            sustain_secs: 2.0,
            strum_ms: 10.0,
            looping: false,
            note_length: 2,
            zoom: ZOOM_BASE,
        }
    }
}

impl PlaybackSettings {
    pub fn internal_speed(&self) -> f64 {
        self.speed * SPEED_SCALE
    }

    pub fn beat_ms(&self) -> f64 {
        BASE_BEAT_MS / self.internal_speed()
    }

    pub fn visual_lag_ms(&self) -> f64 {
        VISUAL_LAG_MS / self.internal_speed()
    }

    pub fn loop_early_ms(&self) -> f64 {
        LOOP_EARLY_MS / self.internal_speed()
    }

    pub fn zoom_percent(&self) -> f64 {
        (self.zoom / ZOOM_BASE * 100.0).round()
    }

    pub fn cycle_speed(&mut self) -> f64 {
        self.speed = next_option(&SPEED_OPTIONS, self.speed);
        self.speed
    }

    pub fn cycle_sustain(&mut self) -> f64 {
        self.sustain_secs = next_option(&SUSTAIN_OPTIONS, self.sustain_secs);
        self.sustain_secs
    }

    pub fn cycle_strum(&mut self) -> f64 {
        self.strum_ms = next_option(&STRUM_OPTIONS, self.strum_ms);
        self.strum_ms
    }

    pub fn cycle_note_length(&mut self) -> u32 {
        self.note_length = next_option(&NOTE_LENGTH_OPTIONS, self.note_length);
        self.note_length
    }

    pub fn cycle_zoom(&mut self) -> f64 {
        self.zoom = next_option(&ZOOM_OPTIONS, self.zoom);
        self.zoom
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.looping = !self.looping;
        self.looping
    }

    /// Bring values loaded from a hand-edited config back onto the option lists.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !SPEED_OPTIONS.contains(&self.speed) {
            log::warn!("unsupported speed {}, using {}", self.speed, defaults.speed);
            self.speed = defaults.speed;
        }
        if !SUSTAIN_OPTIONS.contains(&self.sustain_secs) {
            log::warn!("unsupported sustain {}, using {}", self.sustain_secs, defaults.sustain_secs);
            self.sustain_secs = defaults.sustain_secs;
        }
        if !STRUM_OPTIONS.contains(&self.strum_ms) {
            log::warn!("unsupported strum {}, using {}", self.strum_ms, defaults.strum_ms);
            self.strum_ms = defaults.strum_ms;
        }
        if !NOTE_LENGTH_OPTIONS.contains(&self.note_length) {
            log::warn!(
                "unsupported note length {}, using {}",
                self.note_length,
                defaults.note_length
            );
            self.note_length = defaults.note_length;
        }
        if !ZOOM_OPTIONS.contains(&self.zoom) {
            log::warn!("unsupported zoom {}, using {}", self.zoom, defaults.zoom);
            self.zoom = defaults.zoom;
        }
        self
    }
}

/// Step to the entry after `current`, wrapping. Unknown values restart the list.
fn next_option<T: Copy + PartialEq>(options: &[T], current: T) -> T {
    let index = options.iter().position(|o| *o == current);
    match index {
        Some(i) => options[(i + 1) % options.len()],
        None => options[0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_beat_is_250ms() {
        let settings = PlaybackSettings::default();
        assert!((settings.beat_ms() - 250.0).abs() < 1e-9);
        assert!((settings.loop_early_ms() - 70.0 / 2.4).abs() < 1e-9);
    }

    #[test]
    fn test_cycle_wraps_around() {
        let mut settings = PlaybackSettings::default();
        assert_eq!(settings.cycle_sustain(), 4.0);
        assert_eq!(settings.cycle_sustain(), 0.5);

        settings.speed = 3.0;
        assert_eq!(settings.cycle_speed(), 0.25);

        assert_eq!(settings.cycle_note_length(), 4);
        assert_eq!(settings.cycle_strum(), 20.0);
        assert_eq!(settings.cycle_zoom(), 0.75);
    }

    #[test]
    fn test_zoom_percent_is_relative_to_base() {
        let mut settings = PlaybackSettings::default();
        assert_eq!(settings.zoom_percent(), 100.0);
        settings.zoom = 1.0;
        assert_eq!(settings.zoom_percent(), 200.0);
    }

    #[test]
    fn test_sanitized_replaces_unknown_values() {
        let settings = PlaybackSettings {
            speed: 7.0,
            note_length: 3,
            ..PlaybackSettings::default()
        }
        .sanitized();
        assert_eq!(settings, PlaybackSettings::default());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: PlaybackSettings = toml::from_str("looping = true\nstrum_ms = 40.0").expect("parse");
        assert!(settings.looping);
        assert_eq!(settings.strum_ms, 40.0);
        assert_eq!(settings.note_length, 2);
    }
}
