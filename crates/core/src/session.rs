use std::collections::BTreeSet;

use fretseq_grid::{ChordShape, Grid, GridError, MeasurePosition, Note, NoteId};

use crate::audio::{AudioService, Clock};
use crate::drag::{self, DragEngine, DragEvent, DragOrigin, DragPhase, GhostPreview};
use crate::event::RenderEvent;
use crate::history::UndoHistory;
use crate::scheduler::Scheduler;
use crate::settings::PlaybackSettings;
use crate::viewport::{GridViewport, Point};

/// What lies under the pointer, for context menus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Pill(NoteId),
    /// An empty cell; `row` is 0-based from the top string.
    Cell { beat: u32, row: u8 },
    Outside,
}

/// Everything one editor window needs: the grid, its undo history, the drag
/// engine, and playback, wired to an audio output and a clock.
///
/// All methods run to completion on the caller's thread. Time only moves
/// forward inside [`tick`](Session::tick), which the front end calls once per
/// frame.
pub struct Session {
    grid: Grid,
    history: UndoHistory,
    drag: DragEngine,
    scheduler: Scheduler,
    settings: PlaybackSettings,
    viewport: GridViewport,
    cursor: u32,
    erase_mode: bool,
    audio: Box<dyn AudioService>,
    clock: Box<dyn Clock>,
    events: Vec<RenderEvent>,
}

impl Session {
    pub fn new(audio: Box<dyn AudioService>, clock: Box<dyn Clock>, settings: PlaybackSettings) -> Self {
        let viewport = GridViewport {
            zoom: settings.zoom,
            ..GridViewport::default()
        };
        Self {
            grid: Grid::new(),
            history: UndoHistory::new(),
            drag: DragEngine::new(),
            scheduler: Scheduler::new(),
            settings,
            viewport,
            cursor: 0,
            erase_mode: false,
            audio,
            clock,
            events: Vec::new(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn notes(&self) -> &[Note] {
        self.grid.notes()
    }

    pub fn timeline_len(&self) -> u32 {
        self.grid.timeline_len()
    }

    /// Beat just after the last auto-placed note.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn viewport(&self) -> &GridViewport {
        &self.viewport
    }

    /// The renderer reports where the grid is and how far it is scrolled.
    pub fn set_viewport(&mut self, left: f64, top: f64, scroll_left: f64) {
        self.viewport.left = left;
        self.viewport.top = top;
        self.viewport.scroll_left = scroll_left;
    }

    pub fn erase_mode(&self) -> bool {
        self.erase_mode
    }

    pub fn set_erase_mode(&mut self, on: bool) {
        self.erase_mode = on;
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn drain_events(&mut self) -> Vec<RenderEvent> {
        std::mem::take(&mut self.events)
    }

    // -- direct edits ------------------------------------------------------

    /// Add a fretted note at the first span that is free on every string.
    pub fn insert_note(&mut self, string: u8, fret: u8) -> Result<Note, GridError> {
        let duration = self.settings.note_length;
        let before = self.grid.snapshot();
        let result = self.grid.insert_at(string, fret, duration);
        let note = self.report(result)?;
        self.history.record(before);
        self.cursor = note.beat + note.duration;
        log::debug!("inserted {} fret {fret} at {}", note.id, MeasurePosition::of(note.beat));
        self.after_edit();
        Ok(note)
    }

    /// Add a rest after the last rest.
    pub fn insert_rest(&mut self) -> Result<Note, GridError> {
        let duration = self.settings.note_length;
        let before = self.grid.snapshot();
        let result = self.grid.insert_silent(duration);
        let note = self.report(result)?;
        self.history.record(before);
        self.cursor = note.beat + note.duration;
        self.after_edit();
        Ok(note)
    }

    /// Context-menu add on an empty cell.
    pub fn add_note_at(&mut self, beat: u32, row: u8, fret: u8) -> Result<Note, GridError> {
        let before = self.grid.snapshot();
        let result = self.grid.add_at(beat, row.saturating_add(1), fret);
        let note = self.report(result)?;
        self.history.record(before);
        self.after_edit();
        Ok(note)
    }

    pub fn erase(&mut self, id: NoteId) -> Option<Note> {
        let before = self.grid.snapshot();
        let removed = self.grid.erase(id)?;
        self.history.record(before);
        log::debug!("erased {id}");
        self.after_edit();
        Some(removed)
    }

    pub fn change_fret(&mut self, id: NoteId, fret: u8) -> Result<Note, GridError> {
        let before = self.grid.snapshot();
        let result = self.grid.change_fret(id, fret);
        let note = self.report(result)?;
        self.history.record(before);
        self.after_edit();
        Ok(note)
    }

    pub fn move_note(&mut self, id: NoteId, beat: u32, string: u8) -> Result<Note, GridError> {
        let action = drag::DropAction::Move { id, beat, string };
        let result = drag::commit(&action, &mut self.grid, &mut self.history);
        let mut moved = self.report(result)?;
        self.after_edit();
        Ok(moved.remove(0))
    }

    /// Non-drag chord insert: the whole shape lands at the first beat where
    /// none of its notes touch an existing note.
    pub fn quick_insert_chord(&mut self, shape: &ChordShape) -> Result<Vec<Note>, GridError> {
        let duration = self.settings.note_length;
        let before = self.grid.snapshot();
        let result = self.grid.insert_chord(shape, duration);
        let placed = self.report(result)?;
        if placed.is_empty() {
            return Ok(placed);
        }
        let beat = placed[0].beat;
        self.history.record(before);
        self.cursor = beat + duration;
        log::debug!("chord {} placed at {}", shape.name(), MeasurePosition::of(beat));
        self.after_edit();
        Ok(placed)
    }

    /// Restore the notes from before the last edit. `false` when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> bool {
        if !self.history.undo(&mut self.grid) {
            return false;
        }
        self.after_edit();
        true
    }

    pub fn hit_test(&self, pointer: Point) -> Hit {
        let hit = self.viewport.cell_at(pointer, self.grid.timeline_len());
        let Some((beat, string)) = hit.cell() else {
            return Hit::Outside;
        };
        let under = |silent: bool| {
            self.grid
                .notes()
                .iter()
                .find(|n| n.silent == silent && n.string == string && n.overlaps(beat, beat))
        };
        match under(false).or_else(|| under(true)) {
            Some(note) => Hit::Pill(note.id),
            None => Hit::Cell {
                beat,
                row: string - 1,
            },
        }
    }

    // -- pointer -----------------------------------------------------------

    pub fn pointer_down(&mut self, origin: DragOrigin, pointer: Point) -> bool {
        let now = self.clock.now_ms();
        let fret_cell = match origin {
            DragOrigin::FretCell { string, fret } => Some((string, fret)),
            _ => None,
        };
        if !self.drag.press(origin, pointer, now, &self.grid, &self.viewport) {
            return false;
        }
        if let Some((string, fret)) = fret_cell {
            self.audio.play(string.saturating_sub(1), fret, self.settings.sustain_secs);
        }
        true
    }

    pub fn pointer_move(&mut self, pointer: Point) {
        self.poll_drag();
        let event = self
            .drag
            .pointer_move(pointer, &self.grid, &self.viewport, self.settings.note_length);
        self.handle_drag(event);
    }

    pub fn pointer_up(&mut self, pointer: Point) {
        self.poll_drag();
        let event = self
            .drag
            .release(pointer, &self.grid, &self.viewport, self.settings.note_length);
        self.handle_drag(event);
    }

    pub fn cancel_drag(&mut self) {
        let event = self.drag.cancel();
        self.handle_drag(event);
    }

    pub fn drag_phase(&self) -> DragPhase {
        self.drag.phase()
    }

    pub fn ghost(&self) -> Option<&GhostPreview> {
        self.drag.ghost()
    }

    /// Promote a press whose hold delay has run out, so pointer events that
    /// beat the next frame still see the drag.
    fn poll_drag(&mut self) {
        let now = self.clock.now_ms();
        let event = self
            .drag
            .poll(now, &self.grid, &self.viewport, self.settings.note_length);
        self.handle_drag(event);
    }

    fn handle_drag(&mut self, event: DragEvent) {
        match event {
            DragEvent::None => {}
            DragEvent::Click(origin) => self.click(origin),
            DragEvent::Ghost { audition } => {
                if audition {
                    self.audition_ghost();
                }
                self.events.push(RenderEvent::GhostChanged);
            }
            DragEvent::Commit(action) => {
                self.events.push(RenderEvent::GhostChanged);
                let result = drag::commit(&action, &mut self.grid, &mut self.history);
                if self.report(result).is_ok() {
                    self.after_edit();
                }
            }
            DragEvent::Cancelled => self.events.push(RenderEvent::GhostChanged),
        }
    }

    fn click(&mut self, origin: DragOrigin) {
        let now = self.clock.now_ms();
        match origin {
            DragOrigin::Pill(id) => {
                if self.erase_mode {
                    self.erase(id);
                    return;
                }
                if let Some(note) = self.grid.note(id).copied() {
                    self.scheduler.preview_note(
                        now,
                        &note,
                        &self.settings,
                        self.audio.as_mut(),
                        &mut self.events,
                    );
                }
            }
            DragOrigin::FretCell { string, fret } => {
                // a rejection is already reported as an error event
                self.insert_note(string, fret).ok();
            }
            DragOrigin::Chord(shape) => {
                let result = shape.tones();
                if let Ok(tones) = self.report(result) {
                    self.scheduler.preview_chord(
                        now,
                        &tones,
                        &self.settings,
                        self.audio.as_mut(),
                        &mut self.events,
                    );
                }
            }
        }
    }

    fn audition_ghost(&mut self) {
        let Some(ghost) = self.drag.ghost() else {
            return;
        };
        for note in ghost.notes.iter().filter(|n| !n.silent) {
            self.audio
                .play(note.string.saturating_sub(1), note.fret, self.settings.sustain_secs);
        }
    }

    // -- playback ----------------------------------------------------------

    pub fn play(&mut self) -> bool {
        let now = self.clock.now_ms();
        self.scheduler.start(now, &self.grid, &self.settings, &mut self.events)
    }

    pub fn pause(&mut self) {
        self.scheduler.pause(&mut self.events);
    }

    pub fn toggle_playback(&mut self) -> bool {
        if self.scheduler.is_playing() {
            self.pause();
            false
        } else {
            self.play()
        }
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    pub fn progress(&self) -> Option<f64> {
        self.scheduler.progress()
    }

    pub fn active_note_ids(&self) -> BTreeSet<NoteId> {
        self.scheduler.active_note_ids()
    }

    pub fn start_beat(&self) -> u32 {
        self.scheduler.start_beat()
    }

    pub fn set_start_beat(&mut self, beat: u32) -> Result<(), GridError> {
        let result = self.scheduler.set_start_beat(beat, self.grid.timeline_len());
        self.report(result)
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.settings.toggle_loop()
    }

    pub fn cycle_speed(&mut self) -> f64 {
        self.settings.cycle_speed()
    }

    pub fn cycle_sustain(&mut self) -> f64 {
        self.settings.cycle_sustain()
    }

    pub fn cycle_strum(&mut self) -> f64 {
        self.settings.cycle_strum()
    }

    pub fn cycle_note_length(&mut self) -> u32 {
        self.settings.cycle_note_length()
    }

    pub fn cycle_zoom(&mut self) -> f64 {
        self.viewport.zoom = self.settings.cycle_zoom();
        self.viewport.zoom
    }

    /// Advance one frame: promote a held press into a drag, then fire due
    /// previews and playback callbacks and move the play-head.
    pub fn tick(&mut self) {
        self.poll_drag();
        let now = self.clock.now_ms();
        self.scheduler.tick(
            now,
            &self.grid,
            &self.settings,
            self.audio.as_mut(),
            &mut self.events,
        );
    }

    fn after_edit(&mut self) {
        self.events.push(RenderEvent::NotesChanged);
        let now = self.clock.now_ms();
        self.scheduler
            .sync_timeline(now, &self.grid, &self.settings, &mut self.events);
    }

    /// Surface a rejected edit to the user; the grid is already unchanged.
    fn report<T>(&mut self, result: Result<T, GridError>) -> Result<T, GridError> {
        if let Err(e) = &result {
            log::warn!("edit rejected: {e}");
            self.events.push(RenderEvent::Error(e.to_string()));
        }
        result
    }
}
