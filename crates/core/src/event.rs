use fretseq_grid::NoteId;

/// Visual feedback for the renderer. The core never draws; it only reports
/// what changed and lets the renderer own timing of the visuals.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// The committed note collection changed.
    NotesChanged,
    /// The drag ghost appeared, moved, or was discarded.
    GhostChanged,
    /// Play-head position in `[0, 1)` across `[start_beat, timeline_len)`.
    Progress(f64),
    PlaybackStarted { start_beat: u32 },
    PlaybackStopped,
    NoteActive(NoteId),
    NoteReleased(NoteId),
    /// Highlight a fretboard cell for `hold_ms`.
    Flash { string: u8, fret: u8, hold_ms: f64 },
    /// A rejected edit, worded for the user.
    Error(String),
}
