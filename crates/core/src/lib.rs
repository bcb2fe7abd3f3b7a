//! Editing and playback core for the fret grid sequencer.
//!
//! [`Session`] ties the pieces together: the note [`Grid`] with its
//! [`UndoHistory`], the [`DragEngine`] that turns pointer input into commits,
//! and the [`Scheduler`] that plays the grid back through an [`AudioService`].

pub mod audio;
pub mod drag;
pub mod event;
pub mod history;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod viewport;

pub use audio::{AudioService, Clock, SilentAudio, SystemClock};
pub use drag::{DragEngine, DragEvent, DragOrigin, DragPhase, DropAction, GhostNote, GhostPreview};
pub use event::RenderEvent;
pub use history::{UNDO_LIMIT, UndoHistory};
pub use scheduler::{PlaybackSession, ScheduledNote, Scheduler, plan};
pub use session::{Hit, Session};
pub use settings::PlaybackSettings;
pub use viewport::{CellHit, GridViewport, Point, autoscroll};

pub use fretseq_grid::{
    ChordShape, ChordTone, Grid, GridError, MEASURE_LENGTH, MAX_FRET, MeasurePosition, Note, NoteId,
    NoteSpec, STRING_COUNT, Timeline,
};
