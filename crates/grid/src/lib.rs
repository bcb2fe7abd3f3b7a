//! Grid model for the fretboard sequencer: notes, timeline and placement rules.

mod chord;
mod grid;
mod note;
pub mod placement;
mod timeline;

pub use chord::{ChordShape, ChordTone};
pub use grid::Grid;
pub use note::{
    Lane, MAX_BEAT, MAX_FRET, MEASURE_LENGTH, Note, NoteId, NoteSpec, REST_STRING, STRING_COUNT,
    ranges_overlap, validate_fret, validate_string,
};
pub use timeline::{MeasurePosition, Timeline, length_covering};

/// Rejected edit. The message is meant to be shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Invalid fret {0} (expected 0-24)")]
    InvalidFret(u8),

    #[error("Invalid string {0} (expected 1-6)")]
    InvalidString(u8),

    #[error("Note length must be at least one beat")]
    InvalidDuration,

    #[error("Beat {beat} is outside the {length}-beat grid")]
    InvalidBeat { beat: u32, length: u32 },

    #[error("No note with id {0}")]
    UnknownNote(NoteId),

    #[error("Notes of one group overlap on the same string")]
    OverlappingGroup,

    #[error("Cannot read chord shape '{0}'")]
    InvalidShape(String),
}
