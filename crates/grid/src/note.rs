use serde::{Deserialize, Serialize};

use crate::GridError;

/// Number of strings on the instrument; grid rows are `0..STRING_COUNT`.
pub const STRING_COUNT: u8 = 6;

/// Highest playable fret.
pub const MAX_FRET: u8 = 24;

/// Beats per measure - the timeline grows in whole measures.
pub const MEASURE_LENGTH: u32 = 8;

/// Exclusive upper bound on where a note may end, leaving room for the
/// timeline to round up to a whole measure.
pub const MAX_BEAT: u32 = u32::MAX - MEASURE_LENGTH;

/// Placeholder string carried by silent notes (rests).
pub const REST_STRING: u8 = 1;

/// Opaque note identity, allocated by the [`Grid`](crate::Grid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(pub u64);

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A placed "pill" on the grid.
///
/// `string` is 1-based with 1 being the top row (high e). A note occupies the
/// inclusive beat range `beat..=last_beat()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub string: u8,
    pub fret: u8,
    pub beat: u32,
    pub duration: u32,
    #[serde(default)]
    pub silent: bool,
}

impl Note {
    /// Last beat covered by this note (inclusive).
    pub fn last_beat(&self) -> u32 {
        self.beat.saturating_add(self.duration.max(1) - 1)
    }

    /// Zero-based grid row, 0 = top string.
    pub fn row(&self) -> u8 {
        self.string - 1
    }

    pub fn lane(&self) -> Lane {
        if self.silent {
            Lane::Rest
        } else {
            Lane::String(self.string)
        }
    }

    pub fn overlaps(&self, start: u32, last: u32) -> bool {
        ranges_overlap(self.beat, self.last_beat(), start, last)
    }

    pub(crate) fn from_spec(id: NoteId, spec: NoteSpec) -> Self {
        Self {
            id,
            string: spec.string,
            fret: spec.fret,
            beat: spec.beat,
            duration: spec.duration,
            silent: spec.silent,
        }
    }
}

/// Collision lane. Audible notes only collide with audible notes on the same
/// string; rests only collide with other rests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Rest,
    String(u8),
}

/// A note that has not been committed yet (no id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSpec {
    pub string: u8,
    pub fret: u8,
    pub beat: u32,
    pub duration: u32,
    #[serde(default)]
    pub silent: bool,
}

impl NoteSpec {
    pub fn audible(string: u8, fret: u8, beat: u32, duration: u32) -> Self {
        Self {
            string,
            fret,
            beat,
            duration,
            silent: false,
        }
    }

    pub fn rest(beat: u32, duration: u32) -> Self {
        Self {
            string: REST_STRING,
            fret: 0,
            beat,
            duration,
            silent: true,
        }
    }

    pub fn last_beat(&self) -> u32 {
        self.beat.saturating_add(self.duration.max(1) - 1)
    }

    pub fn lane(&self) -> Lane {
        if self.silent {
            Lane::Rest
        } else {
            Lane::String(self.string)
        }
    }

    /// Reject anything outside the instrument's range before it reaches the grid.
    pub fn validate(&self) -> Result<(), GridError> {
        validate_string(self.string)?;
        validate_fret(self.fret)?;
        if self.duration == 0 {
            return Err(GridError::InvalidDuration);
        }
        if self.beat.checked_add(self.duration).is_none_or(|end| end > MAX_BEAT) {
            return Err(GridError::InvalidBeat {
                beat: self.beat,
                length: MAX_BEAT,
            });
        }
        Ok(())
    }
}

/// Inclusive range intersection.
pub fn ranges_overlap(a_start: u32, a_last: u32, b_start: u32, b_last: u32) -> bool {
    a_start <= b_last && b_start <= a_last
}

pub fn validate_fret(fret: u8) -> Result<(), GridError> {
    if fret > MAX_FRET {
        return Err(GridError::InvalidFret(fret));
    }
    Ok(())
}

pub fn validate_string(string: u8) -> Result<(), GridError> {
    if string == 0 || string > STRING_COUNT {
        return Err(GridError::InvalidString(string));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(string: u8, beat: u32, duration: u32) -> Note {
        Note {
            id: NoteId(1),
            string,
            fret: 0,
            beat,
            duration,
            silent: false,
        }
    }

    #[test]
    fn test_last_beat_is_inclusive() {
        assert_eq!(note(1, 0, 1).last_beat(), 0);
        assert_eq!(note(1, 4, 4).last_beat(), 7);
    }

    #[test]
    fn test_adjacent_ranges_do_not_overlap() {
        let n = note(1, 0, 4);
        assert!(!n.overlaps(4, 7), "beat 4 starts after last beat 3");
        assert!(n.overlaps(3, 3));
    }

    #[test]
    fn test_silent_notes_have_their_own_lane() {
        let mut n = note(REST_STRING, 0, 2);
        assert_eq!(n.lane(), Lane::String(REST_STRING));
        n.silent = true;
        assert_eq!(n.lane(), Lane::Rest);
    }

    #[test]
    fn test_validate_rejects_out_of_range_input() {
        assert_eq!(
            NoteSpec::audible(1, 25, 0, 1).validate(),
            Err(GridError::InvalidFret(25))
        );
        assert_eq!(
            NoteSpec::audible(7, 0, 0, 1).validate(),
            Err(GridError::InvalidString(7))
        );
        assert_eq!(
            NoteSpec::audible(0, 0, 0, 1).validate(),
            Err(GridError::InvalidString(0))
        );
        assert_eq!(
            NoteSpec::audible(1, 0, 0, 0).validate(),
            Err(GridError::InvalidDuration)
        );
        assert!(NoteSpec::audible(6, 24, 0, 1).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_notes_ending_past_max_beat() {
        assert_eq!(
            NoteSpec::audible(1, 0, MAX_BEAT, 1).validate(),
            Err(GridError::InvalidBeat { beat: MAX_BEAT, length: MAX_BEAT })
        );
        assert_eq!(
            NoteSpec::rest(0, u32::MAX).validate(),
            Err(GridError::InvalidBeat { beat: 0, length: MAX_BEAT })
        );
        assert!(NoteSpec::audible(1, 0, MAX_BEAT - 1, 1).validate().is_ok());
        assert_eq!(note(1, u32::MAX, 4).last_beat(), u32::MAX);
    }

    #[test]
    fn test_silent_note_defaults_when_field_missing() {
        let json = r#"{"id":7,"string":2,"fret":3,"beat":0,"duration":1}"#;
        let decoded: Note = serde_json::from_str(json).expect("deserialize");
        assert!(!decoded.silent);
        assert_eq!(decoded.id, NoteId(7));
    }
}
