use crate::note::{MEASURE_LENGTH, Note};

/// Beat-indexed length of the grid, always a whole number of measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    length: u32,
}

impl Timeline {
    /// Smallest multiple of [`MEASURE_LENGTH`] strictly greater than the last
    /// occupied beat. An empty grid still shows one measure.
    pub fn for_notes(notes: &[Note]) -> Self {
        let last_beat = notes.iter().map(Note::last_beat).max().unwrap_or(0);
        Self {
            length: length_covering(last_beat),
        }
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn measures(&self) -> u32 {
        self.length / MEASURE_LENGTH
    }

    pub fn contains(&self, beat: u32) -> bool {
        beat < self.length
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self {
            length: MEASURE_LENGTH,
        }
    }
}

/// Whole-measure length needed to show `last_beat`.
pub fn length_covering(last_beat: u32) -> u32 {
    (last_beat / MEASURE_LENGTH + 1).saturating_mul(MEASURE_LENGTH)
}

/// 1-based measure/beat position for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurePosition {
    pub measure: u32,
    pub beat: u32,
}

impl MeasurePosition {
    pub fn of(beat: u32) -> Self {
        Self {
            measure: beat / MEASURE_LENGTH + 1,
            beat: beat % MEASURE_LENGTH + 1,
        }
    }
}

impl std::fmt::Display for MeasurePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.measure, self.beat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::NoteId;

    fn note(beat: u32, duration: u32) -> Note {
        Note {
            id: NoteId(0),
            string: 1,
            fret: 0,
            beat,
            duration,
            silent: false,
        }
    }

    #[test]
    fn test_empty_grid_is_one_measure() {
        assert_eq!(Timeline::for_notes(&[]).length(), 8);
    }

    #[test]
    fn test_length_covers_last_beat() {
        // last beat 7 still fits the first measure
        assert_eq!(Timeline::for_notes(&[note(4, 4)]).length(), 8);
        // last beat 8 needs a second measure
        assert_eq!(Timeline::for_notes(&[note(4, 5)]).length(), 16);
        assert_eq!(Timeline::for_notes(&[note(0, 1), note(23, 1)]).length(), 24);
        assert_eq!(Timeline::for_notes(&[note(24, 1)]).measures(), 4);
    }

    #[test]
    fn test_length_covering_saturates() {
        assert_eq!(length_covering(u32::MAX), u32::MAX);
        assert_eq!(length_covering(15), 16);
    }

    #[test]
    fn test_measure_position_display() {
        assert_eq!(MeasurePosition::of(0).to_string(), "1.1");
        assert_eq!(MeasurePosition::of(9).to_string(), "2.2");
    }
}
