use std::sync::Arc;

use crate::chord::ChordShape;
use crate::note::{Note, NoteId, NoteSpec, REST_STRING, validate_fret, validate_string};
use crate::placement::{clear_lanes, first_free_beat, group_disjoint};
use crate::timeline::Timeline;
use crate::GridError;

/// The authoritative set of placed notes plus the timeline that covers them.
///
/// Notes are held behind an `Arc` and copied on write, so a [`snapshot`] stays
/// immutable no matter what happens to the grid afterwards.
///
/// [`snapshot`]: Grid::snapshot
#[derive(Debug, Clone)]
pub struct Grid {
    notes: Arc<Vec<Note>>,
    timeline: Timeline,
    next_id: u64,
}

impl Grid {
    pub fn new() -> Self {
        Self {
            notes: Arc::new(Vec::new()),
            timeline: Timeline::default(),
            next_id: 1,
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn timeline(&self) -> Timeline {
        self.timeline
    }

    pub fn timeline_len(&self) -> u32 {
        self.timeline.length()
    }

    /// Shared handle to the current note collection.
    pub fn snapshot(&self) -> Arc<Vec<Note>> {
        Arc::clone(&self.notes)
    }

    /// Replace the whole note collection (undo).
    pub fn restore(&mut self, snapshot: Arc<Vec<Note>>) {
        self.notes = snapshot;
        self.refresh_timeline();
    }

    /// Auto-place an audible note at the earliest span that is free on every
    /// string.
    pub fn insert_at(&mut self, string: u8, fret: u8, duration: u32) -> Result<Note, GridError> {
        let probe = NoteSpec::audible(string, fret, 0, duration);
        probe.validate()?;

        let spec = NoteSpec {
            beat: first_free_beat(self.notes.iter(), duration),
            ..probe
        };
        spec.validate()?;
        let note = self.push(spec);
        self.refresh_timeline();
        Ok(note)
    }

    /// Auto-place a rest. Only other rests block it.
    pub fn insert_silent(&mut self, duration: u32) -> Result<Note, GridError> {
        let probe = NoteSpec::rest(0, duration);
        probe.validate()?;

        let spec = NoteSpec {
            beat: first_free_beat(self.notes.iter().filter(|n| n.silent), duration),
            ..probe
        };
        spec.validate()?;
        let note = self.push(spec);
        self.refresh_timeline();
        Ok(note)
    }

    /// Auto-place a whole chord at the earliest beat where none of its notes
    /// would touch any existing note.
    pub fn insert_chord(&mut self, shape: &ChordShape, duration: u32) -> Result<Vec<Note>, GridError> {
        if duration == 0 {
            return Err(GridError::InvalidDuration);
        }
        let specs = shape.note_specs(0, duration)?;
        if specs.is_empty() {
            return Ok(Vec::new());
        }

        // every tone shares beat and duration, so the group fits exactly where
        // a single span of `duration` fits
        let beat = first_free_beat(self.notes.iter(), duration);
        NoteSpec { beat, ..specs[0] }.validate()?;
        let placed = specs
            .into_iter()
            .map(|spec| self.push(NoteSpec { beat, ..spec }))
            .collect();
        self.refresh_timeline();
        Ok(placed)
    }

    /// Commit a group of notes, overwriting anything in their lanes.
    ///
    /// Every candidate is validated before the grid is touched, so a rejected
    /// group leaves the grid unchanged.
    pub fn place(&mut self, specs: &[NoteSpec]) -> Result<Vec<Note>, GridError> {
        for spec in specs {
            spec.validate()?;
        }
        if !group_disjoint(specs) {
            return Err(GridError::OverlappingGroup);
        }

        let overwrite = clear_lanes(&self.notes, specs, None);
        if !overwrite.removed.is_empty() {
            log::debug!("place: overwriting {} note(s)", overwrite.removed.len());
        }
        *Arc::make_mut(&mut self.notes) = overwrite.kept;

        let placed = specs.iter().map(|spec| self.push(*spec)).collect();
        self.refresh_timeline();
        Ok(placed)
    }

    /// Context-menu add: a one-beat note on an existing cell.
    pub fn add_at(&mut self, beat: u32, string: u8, fret: u8) -> Result<Note, GridError> {
        if !self.timeline.contains(beat) {
            return Err(GridError::InvalidBeat {
                beat,
                length: self.timeline_len(),
            });
        }
        let mut placed = self.place(&[NoteSpec::audible(string, fret, beat, 1)])?;
        Ok(placed.remove(0))
    }

    /// Relocate one note, overwriting whatever occupies the destination in its
    /// lane. Rests keep their placeholder string.
    pub fn move_note(&mut self, id: NoteId, beat: u32, string: u8) -> Result<Note, GridError> {
        validate_string(string)?;
        let moving = *self.note(id).ok_or(GridError::UnknownNote(id))?;

        let string = if moving.silent { REST_STRING } else { string };
        let target = NoteSpec {
            string,
            fret: moving.fret,
            beat,
            duration: moving.duration,
            silent: moving.silent,
        };
        target.validate()?;

        let overwrite = clear_lanes(&self.notes, &[target], Some(id));
        let moved = Note::from_spec(id, target);
        let notes = Arc::make_mut(&mut self.notes);
        *notes = overwrite.kept;
        notes.push(moved);

        self.refresh_timeline();
        Ok(moved)
    }

    /// Remove a note. Returns `None` when the id is unknown.
    pub fn erase(&mut self, id: NoteId) -> Option<Note> {
        let index = self.notes.iter().position(|n| n.id == id)?;
        let removed = Arc::make_mut(&mut self.notes).remove(index);
        self.refresh_timeline();
        Some(removed)
    }

    pub fn change_fret(&mut self, id: NoteId, fret: u8) -> Result<Note, GridError> {
        validate_fret(fret)?;
        let note = Arc::make_mut(&mut self.notes)
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(GridError::UnknownNote(id))?;
        note.fret = fret;
        Ok(*note)
    }

    fn push(&mut self, spec: NoteSpec) -> Note {
        let note = Note::from_spec(NoteId(self.next_id), spec);
        self.next_id += 1;
        Arc::make_mut(&mut self.notes).push(note);
        note
    }

    fn refresh_timeline(&mut self) {
        let timeline = Timeline::for_notes(&self.notes);
        if timeline != self.timeline {
            log::debug!(
                "timeline {} -> {} beats",
                self.timeline.length(),
                timeline.length()
            );
            self.timeline = timeline;
        }
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}
