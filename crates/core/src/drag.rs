//! Press / hold / drag / drop handling shared by the three drag sources: a
//! pill already on the grid, a fretboard cell, and a chord-list entry.

use std::sync::Arc;

use fretseq_grid::{ChordShape, Grid, GridError, Note, NoteId, NoteSpec, REST_STRING};

use crate::history::UndoHistory;
use crate::settings::HOLD_DELAY_MS;
use crate::viewport::{CellHit, GridViewport, Point};

/// Pointer travel that counts as a move while a press is still armed.
pub const CLICK_SLOP_PX: f64 = 4.0;

/// What the pointer went down on.
#[derive(Debug, Clone, PartialEq)]
pub enum DragOrigin {
    Pill(NoteId),
    FretCell { string: u8, fret: u8 },
    Chord(ChordShape),
}

/// One note of a drag preview. `slot` keys the note within its group so the
/// renderer can keep a chord ghost coherent while it moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GhostNote {
    pub slot: u8,
    pub string: u8,
    pub fret: u8,
    pub beat: u32,
    pub duration: u32,
    pub silent: bool,
}

impl GhostNote {
    fn spec(&self) -> NoteSpec {
        NoteSpec {
            string: self.string,
            fret: self.fret,
            beat: self.beat,
            duration: self.duration,
            silent: self.silent,
        }
    }
}

/// Uncommitted result of the drag in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostPreview {
    /// Stable identity of the dragged thing, e.g. `pill-#3` or `chord-x-3-2-0-1-0`.
    pub group: String,
    pub notes: Vec<GhostNote>,
}

/// The grid mutation a successful drop asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum DropAction {
    Move { id: NoteId, beat: u32, string: u8 },
    Place(Vec<NoteSpec>),
}

/// Result of feeding one pointer event to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum DragEvent {
    None,
    /// The press ended before the hold delay: a plain click.
    Click(DragOrigin),
    /// The ghost was rebuilt. `audition` is set when the pointer entered a
    /// cell that has not just been auditioned.
    Ghost { audition: bool },
    Commit(DropAction),
    /// Dropped outside the grid, or the dragged pill disappeared.
    Cancelled,
}

#[derive(Debug, Clone)]
struct Armed {
    origin: DragOrigin,
    pressed_at: f64,
    pointer: Point,
    grab: Point,
}

#[derive(Debug, Clone)]
struct Dragging {
    origin: DragOrigin,
    /// Pointer offset from the dragged pill's top-left corner.
    grab: Point,
    hover: Option<(i64, i64)>,
    last_auditioned_cell: Option<(i64, i64)>,
    ghost: Option<GhostPreview>,
}

#[derive(Debug, Clone, Default)]
enum DragState {
    #[default]
    Idle,
    Armed(Armed),
    Dragging(Dragging),
}

/// Which stage the engine is in, for callers that only need to branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Armed,
    Dragging,
}

/// Single-drag state machine: Idle, Armed, Dragging, then back to Idle on a
/// click, commit, or cancel. Only one drag runs at a time.
#[derive(Debug, Clone, Default)]
pub struct DragEngine {
    state: DragState,
}

impl DragEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> DragPhase {
        match self.state {
            DragState::Idle => DragPhase::Idle,
            DragState::Armed(_) => DragPhase::Armed,
            DragState::Dragging(_) => DragPhase::Dragging,
        }
    }

    pub fn ghost(&self) -> Option<&GhostPreview> {
        match &self.state {
            DragState::Dragging(drag) => drag.ghost.as_ref(),
            _ => None,
        }
    }

    /// Pointer down on `origin`. Ignored while another press or drag is live.
    pub fn press(
        &mut self,
        origin: DragOrigin,
        pointer: Point,
        now: f64,
        grid: &Grid,
        viewport: &GridViewport,
    ) -> bool {
        if !matches!(self.state, DragState::Idle) {
            return false;
        }
        let grab = match &origin {
            DragOrigin::Pill(id) => {
                let Some(note) = grid.note(*id) else {
                    return false;
                };
                pointer - viewport.cell_origin(note.beat, note.row())
            }
            _ => Point::default(),
        };
        log::debug!("drag armed: {origin:?}");
        self.state = DragState::Armed(Armed {
            origin,
            pressed_at: now,
            pointer,
            grab,
        });
        true
    }

    /// Promote an armed press to a drag once the hold delay has passed.
    pub fn poll(&mut self, now: f64, grid: &Grid, viewport: &GridViewport, note_length: u32) -> DragEvent {
        let DragState::Armed(armed) = &self.state else {
            return DragEvent::None;
        };
        if now - armed.pressed_at < HOLD_DELAY_MS {
            return DragEvent::None;
        }

        let armed = armed.clone();
        log::debug!("drag started: {:?}", armed.origin);
        self.state = DragState::Dragging(Dragging {
            origin: armed.origin,
            grab: armed.grab,
            hover: None,
            last_auditioned_cell: None,
            ghost: None,
        });
        self.track(armed.pointer, grid, viewport, note_length)
    }

    pub fn pointer_move(
        &mut self,
        pointer: Point,
        grid: &Grid,
        viewport: &GridViewport,
        note_length: u32,
    ) -> DragEvent {
        match &self.state {
            DragState::Idle => DragEvent::None,
            DragState::Armed(armed) => {
                let delta = pointer - armed.pointer;
                if delta.x.hypot(delta.y) <= CLICK_SLOP_PX {
                    return DragEvent::None;
                }
                // moved before the hold fired: collapse into a click
                let origin = armed.origin.clone();
                self.state = DragState::Idle;
                DragEvent::Click(origin)
            }
            DragState::Dragging(_) => self.track(pointer, grid, viewport, note_length),
        }
    }

    pub fn release(
        &mut self,
        pointer: Point,
        grid: &Grid,
        viewport: &GridViewport,
        note_length: u32,
    ) -> DragEvent {
        match std::mem::take(&mut self.state) {
            DragState::Idle => DragEvent::None,
            DragState::Armed(armed) => DragEvent::Click(armed.origin),
            DragState::Dragging(drag) => {
                let hit = viewport.cell_at(pointer - drag.grab, grid.timeline_len());
                match drop_for(&drag.origin, hit, grid, note_length) {
                    Some(drop) => {
                        log::debug!("drop: {drop:?}");
                        DragEvent::Commit(drop)
                    }
                    None => {
                        log::debug!("drag cancelled at beat {} row {}", hit.beat, hit.row);
                        DragEvent::Cancelled
                    }
                }
            }
        }
    }

    /// Abandon whatever is in progress.
    pub fn cancel(&mut self) -> DragEvent {
        match std::mem::take(&mut self.state) {
            DragState::Dragging(_) => DragEvent::Cancelled,
            _ => DragEvent::None,
        }
    }

    fn track(&mut self, pointer: Point, grid: &Grid, viewport: &GridViewport, note_length: u32) -> DragEvent {
        let DragState::Dragging(drag) = &mut self.state else {
            return DragEvent::None;
        };

        let hit = viewport.cell_at(pointer - drag.grab, grid.timeline_len());
        let cell = (hit.beat, hit.row);
        if drag.hover == Some(cell) {
            return DragEvent::None;
        }
        drag.hover = Some(cell);

        if let DragOrigin::Pill(id) = drag.origin {
            if grid.note(id).is_none() {
                log::debug!("dragged note {id} disappeared");
                self.state = DragState::Idle;
                return DragEvent::Cancelled;
            }
        }

        drag.ghost = ghost_for(&drag.origin, hit, grid, note_length);
        let audition = drag.ghost.is_some() && drag.last_auditioned_cell != Some(cell);
        if audition {
            drag.last_auditioned_cell = Some(cell);
        }
        DragEvent::Ghost { audition }
    }
}

/// Whether `hit` lies on the rows of the grid with a non-negative beat. The
/// ghost may hang past the timeline end; only the drop needs a valid cell.
fn on_grid(hit: CellHit) -> Option<(u32, u8)> {
    let beat = u32::try_from(hit.beat).ok()?;
    let string = u8::try_from(hit.row + 1).ok()?;
    fretseq_grid::validate_string(string).ok()?;
    Some((beat, string))
}

fn ghost_for(origin: &DragOrigin, hit: CellHit, grid: &Grid, note_length: u32) -> Option<GhostPreview> {
    let (beat, string) = on_grid(hit)?;
    match origin {
        DragOrigin::Pill(id) => {
            let note = grid.note(*id)?;
            Some(GhostPreview {
                group: format!("pill-{id}"),
                notes: vec![moved_ghost(note, beat, string)],
            })
        }
        DragOrigin::FretCell { fret, .. } => Some(GhostPreview {
            group: "fret-cell".to_string(),
            notes: vec![GhostNote {
                slot: 0,
                string,
                fret: *fret,
                beat,
                duration: note_length,
                silent: false,
            }],
        }),
        DragOrigin::Chord(shape) => {
            let tones = shape.tones().ok()?;
            Some(GhostPreview {
                group: format!("chord-{}", shape.fret_pattern()),
                notes: tones
                    .into_iter()
                    .map(|tone| GhostNote {
                        slot: tone.slot,
                        string: tone.string,
                        fret: tone.fret,
                        beat,
                        duration: note_length,
                        silent: false,
                    })
                    .collect(),
            })
        }
    }
}

fn moved_ghost(note: &Note, beat: u32, string: u8) -> GhostNote {
    GhostNote {
        slot: 0,
        string: if note.silent { REST_STRING } else { string },
        fret: note.fret,
        beat,
        duration: note.duration,
        silent: note.silent,
    }
}

fn drop_for(origin: &DragOrigin, hit: CellHit, grid: &Grid, note_length: u32) -> Option<DropAction> {
    let (beat, string) = hit.cell()?;
    match origin {
        DragOrigin::Pill(id) => {
            grid.note(*id)?;
            Some(DropAction::Move { id: *id, beat, string })
        }
        _ => {
            let ghost = ghost_for(origin, hit, grid, note_length)?;
            Some(DropAction::Place(ghost.notes.iter().map(GhostNote::spec).collect()))
        }
    }
}

/// Apply a drop to the grid, recording the pre-drop notes for undo. A rejected
/// drop leaves both the grid and the history untouched.
pub fn commit(drop: &DropAction, grid: &mut Grid, history: &mut UndoHistory) -> Result<Vec<Note>, GridError> {
    let before: Arc<Vec<Note>> = grid.snapshot();
    let committed = match drop {
        DropAction::Move { id, beat, string } => vec![grid.move_note(*id, *beat, *string)?],
        DropAction::Place(specs) => grid.place(specs)?,
    };
    history.record(before);
    Ok(committed)
}

#[cfg(test)]
mod tests {
    use fretseq_grid::placement::lanes_disjoint;

    use super::*;

    // beat width 36px, rows 48px, grid starts at x = 36 after the gutter
    fn viewport() -> GridViewport {
        GridViewport::default()
    }

    fn at(beat: f64, row: f64) -> Point {
        Point::new(36.0 + beat * 36.0, row * 48.0)
    }

    fn hold(engine: &mut DragEngine, grid: &Grid) -> DragEvent {
        engine.poll(HOLD_DELAY_MS, grid, &viewport(), 2)
    }

    #[test]
    fn test_quick_release_is_a_click() {
        let grid = Grid::new();
        let mut engine = DragEngine::new();
        let origin = DragOrigin::FretCell { string: 2, fret: 5 };

        assert!(engine.press(origin.clone(), at(0.5, 0.5), 0.0, &grid, &viewport()));
        assert_eq!(engine.poll(150.0, &grid, &viewport(), 2), DragEvent::None);
        assert_eq!(engine.phase(), DragPhase::Armed);

        let event = engine.release(at(0.5, 0.5), &grid, &viewport(), 2);
        assert_eq!(event, DragEvent::Click(origin));
        assert_eq!(engine.phase(), DragPhase::Idle);
    }

    #[test]
    fn test_move_before_hold_collapses_to_click() {
        let grid = Grid::new();
        let mut engine = DragEngine::new();
        let origin = DragOrigin::FretCell { string: 2, fret: 5 };
        engine.press(origin.clone(), Point::new(10.0, 10.0), 0.0, &grid, &viewport());

        // jitter within the slop keeps the press armed
        let event = engine.pointer_move(Point::new(12.0, 11.0), &grid, &viewport(), 2);
        assert_eq!(event, DragEvent::None);

        let event = engine.pointer_move(Point::new(30.0, 10.0), &grid, &viewport(), 2);
        assert_eq!(event, DragEvent::Click(origin));
        assert_eq!(engine.phase(), DragPhase::Idle);
        assert_eq!(engine.release(Point::new(30.0, 10.0), &grid, &viewport(), 2), DragEvent::None);
    }

    #[test]
    fn test_second_press_is_ignored_while_dragging() {
        let grid = Grid::new();
        let mut engine = DragEngine::new();
        engine.press(DragOrigin::FretCell { string: 1, fret: 0 }, at(0.5, 0.5), 0.0, &grid, &viewport());
        assert!(!engine.press(DragOrigin::FretCell { string: 2, fret: 0 }, at(1.5, 0.5), 1.0, &grid, &viewport()));
    }

    #[test]
    fn test_fret_cell_drag_builds_ghost_and_auditions_once_per_cell() {
        let grid = Grid::new();
        let mut engine = DragEngine::new();
        engine.press(DragOrigin::FretCell { string: 6, fret: 3 }, at(1.5, 2.5), 0.0, &grid, &viewport());

        assert_eq!(hold(&mut engine, &grid), DragEvent::Ghost { audition: true });
        let ghost = engine.ghost().expect("ghost");
        // the pointer row decides the string, not the fretboard cell
        assert_eq!(ghost.notes[0].string, 3);
        assert_eq!((ghost.notes[0].beat, ghost.notes[0].duration), (1, 2));

        // same cell: nothing to do
        assert_eq!(engine.pointer_move(at(1.8, 2.2), &grid, &viewport(), 2), DragEvent::None);
        // new cell: new ghost and a new audition
        assert_eq!(
            engine.pointer_move(at(2.5, 2.5), &grid, &viewport(), 2),
            DragEvent::Ghost { audition: true }
        );
        // off the grid: ghost goes away, nothing to hear
        assert_eq!(
            engine.pointer_move(Point::new(5.0, 5.0), &grid, &viewport(), 2),
            DragEvent::Ghost { audition: false }
        );
        assert!(engine.ghost().is_none());
    }

    #[test]
    fn test_chord_ghost_is_one_group() {
        let grid = Grid::new();
        let shape: ChordShape = "x32010".parse().expect("shape");
        let mut engine = DragEngine::new();
        engine.press(DragOrigin::Chord(shape), at(3.5, 4.5), 0.0, &grid, &viewport());
        hold(&mut engine, &grid);

        let ghost = engine.ghost().expect("ghost");
        assert_eq!(ghost.group, "chord-x-3-2-0-1-0");
        assert_eq!(ghost.notes.len(), 5);
        assert!(ghost.notes.iter().all(|n| n.beat == 3));
        let slots: Vec<u8> = ghost.notes.iter().map(|n| n.slot).collect();
        assert_eq!(slots, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_chord_drop_commits_atomically() {
        let mut grid = Grid::new();
        let mut history = UndoHistory::new();
        grid.place(&[NoteSpec::audible(5, 0, 2, 4), NoteSpec::audible(6, 0, 2, 4)])
            .expect("place");

        let shape: ChordShape = "x32010".parse().expect("shape");
        let mut engine = DragEngine::new();
        engine.press(DragOrigin::Chord(shape), at(3.5, 0.5), 0.0, &grid, &viewport());
        hold(&mut engine, &grid);

        let DragEvent::Commit(drop) = engine.release(at(3.5, 0.5), &grid, &viewport(), 2) else {
            panic!("expected a commit");
        };
        let placed = commit(&drop, &mut grid, &mut history).expect("commit");

        assert_eq!(placed.len(), 5);
        // A-string note overwritten, muted low E left alone
        assert_eq!(grid.len(), 6);
        assert!(grid.notes().iter().any(|n| n.string == 6 && n.beat == 2));
        assert!(lanes_disjoint(grid.notes()));
        assert!(engine.ghost().is_none());

        assert!(history.undo(&mut grid));
        assert_eq!(grid.len(), 2);
    }

    #[test]
    fn test_drop_outside_grid_cancels_without_mutation() {
        let mut grid = Grid::new();
        grid.insert_at(1, 0, 1).expect("insert");
        let mut engine = DragEngine::new();
        engine.press(DragOrigin::FretCell { string: 1, fret: 7 }, at(1.5, 0.5), 0.0, &grid, &viewport());
        hold(&mut engine, &grid);

        // beat 8 is past the one-measure timeline
        let event = engine.release(at(8.5, 0.5), &grid, &viewport(), 2);

        assert_eq!(event, DragEvent::Cancelled);
        assert_eq!(grid.len(), 1);
        assert_eq!(engine.phase(), DragPhase::Idle);
    }

    #[test]
    fn test_pill_drag_keeps_grab_offset() {
        let mut grid = Grid::new();
        let note = grid.place(&[NoteSpec::audible(2, 5, 1, 2)]).expect("place")[0];
        let other = grid.place(&[NoteSpec::audible(4, 0, 5, 1)]).expect("place")[0];
        let mut history = UndoHistory::new();
        let mut engine = DragEngine::new();

        // grab the pill by its second beat
        engine.press(DragOrigin::Pill(note.id), at(2.5, 1.5), 0.0, &grid, &viewport());
        hold(&mut engine, &grid);
        let ghost = engine.ghost().expect("ghost");
        assert_eq!((ghost.notes[0].beat, ghost.notes[0].string), (1, 2));

        // move right three beats and down two rows
        engine.pointer_move(at(5.5, 3.5), &grid, &viewport(), 2);
        let DragEvent::Commit(drop) = engine.release(at(5.5, 3.5), &grid, &viewport(), 2) else {
            panic!("expected a commit");
        };
        assert_eq!(drop, DropAction::Move { id: note.id, beat: 4, string: 4 });

        commit(&drop, &mut grid, &mut history).expect("commit");
        assert!(grid.note(other.id).is_none(), "same-string overlap is overwritten");
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn test_pill_drag_cancels_when_source_disappears() {
        let mut grid = Grid::new();
        let note = grid.insert_at(1, 0, 1).expect("insert");
        let mut engine = DragEngine::new();
        engine.press(DragOrigin::Pill(note.id), at(0.5, 0.5), 0.0, &grid, &viewport());
        hold(&mut engine, &grid);

        grid.erase(note.id);

        assert_eq!(
            engine.pointer_move(at(3.5, 2.5), &grid, &viewport(), 2),
            DragEvent::Cancelled
        );
        assert_eq!(engine.phase(), DragPhase::Idle);
    }

    #[test]
    fn test_rejected_commit_leaves_history_alone() {
        let mut grid = Grid::new();
        let mut history = UndoHistory::new();
        let drop = DropAction::Place(vec![NoteSpec::audible(1, 40, 0, 1)]);

        assert_eq!(commit(&drop, &mut grid, &mut history), Err(GridError::InvalidFret(40)));
        assert!(history.is_empty());
    }
}
