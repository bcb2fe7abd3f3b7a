use std::collections::{BTreeMap, BTreeSet};

use fretseq_grid::{ChordTone, Grid, GridError, MeasurePosition, Note, NoteId};

use crate::audio::AudioService;
use crate::event::RenderEvent;
use crate::settings::{BASE_BEAT_MS, CHORD_PREVIEW_GAP_MS, PlaybackSettings};

/// A note with its absolute on/off times, relative to the session start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledNote {
    pub note: Note,
    pub on_ms: f64,
    pub off_ms: f64,
}

/// Compute on/off times for every audible note that is still sounding at or
/// after `start_beat`.
///
/// Notes sharing a beat are strummed bass first: the note at `index` in a
/// group of `n` starts `(n - 1 - index) * strum_ms` early, clamped at 0.
pub fn plan(notes: &[Note], start_beat: u32, beat_ms: f64, strum_ms: f64) -> Vec<ScheduledNote> {
    let mut groups: BTreeMap<i64, Vec<Note>> = BTreeMap::new();
    for note in notes.iter().filter(|n| !n.silent && n.last_beat() >= start_beat) {
        let local = i64::from(note.beat) - i64::from(start_beat);
        groups.entry(local).or_default().push(*note);
    }

    let mut scheduled = Vec::new();
    for (local, mut group) in groups {
        group.sort_by(|a, b| b.string.cmp(&a.string));
        let base = local as f64 * beat_ms;
        let size = group.len();
        for (index, note) in group.into_iter().enumerate() {
            let lead_in = (size - 1 - index) as f64 * strum_ms;
            let on_ms = (base - lead_in).max(0.0);
            let off_ms = on_ms + f64::from(note.duration) * beat_ms;
            scheduled.push(ScheduledNote { note, on_ms, off_ms });
        }
    }
    scheduled
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TimerAction {
    NoteOn(Note),
    NoteOff(NoteId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Timer {
    deadline_ms: f64,
    action: TimerAction,
}

/// Sort by deadline; equal deadlines keep their scheduling order.
fn sort_timers(timers: &mut Vec<Timer>) {
    timers.sort_by(|a, b| a.deadline_ms.total_cmp(&b.deadline_ms));
}

/// One pass over the timeline. Owns every pending callback of the pass, so
/// dropping the session cancels them all at once.
#[derive(Debug)]
pub struct PlaybackSession {
    start_beat: u32,
    started_at: f64,
    timeline_len: u32,
    active_ms: f64,
    visual_lag_ms: f64,
    sustain_secs: f64,
    /// Pending timers, deadlines relative to `started_at`, soonest last.
    timers: Vec<Timer>,
    active: BTreeSet<NoteId>,
    progress: f64,
}

impl PlaybackSession {
    fn new(now: f64, grid: &Grid, start_beat: u32, settings: &PlaybackSettings) -> Self {
        let beat_ms = settings.beat_ms();
        let timeline_len = grid.timeline_len();
        let total_ms = f64::from(timeline_len.saturating_sub(start_beat)) * beat_ms;
        let loop_early_ms = if settings.looping {
            settings.loop_early_ms()
        } else {
            0.0
        };

        let mut timers = Vec::new();
        for scheduled in plan(grid.notes(), start_beat, beat_ms, settings.strum_ms) {
            timers.push(Timer {
                deadline_ms: scheduled.on_ms,
                action: TimerAction::NoteOn(scheduled.note),
            });
            timers.push(Timer {
                deadline_ms: scheduled.off_ms,
                action: TimerAction::NoteOff(scheduled.note.id),
            });
        }
        sort_timers(&mut timers);
        // pop from the back
        timers.reverse();

        Self {
            start_beat,
            started_at: now,
            timeline_len,
            active_ms: total_ms - loop_early_ms,
            visual_lag_ms: settings.visual_lag_ms(),
            sustain_secs: settings.sustain_secs,
            timers,
            active: BTreeSet::new(),
            progress: 0.0,
        }
    }

    pub fn start_beat(&self) -> u32 {
        self.start_beat
    }

    pub fn timeline_len(&self) -> u32 {
        self.timeline_len
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn active(&self) -> &BTreeSet<NoteId> {
        &self.active
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Fire every timer due at `elapsed_ms`, in deadline order.
    fn fire_due(&mut self, elapsed_ms: f64, audio: &mut dyn AudioService, events: &mut Vec<RenderEvent>) {
        while self.timers.last().is_some_and(|t| t.deadline_ms <= elapsed_ms) {
            let Some(timer) = self.timers.pop() else {
                break;
            };
            match timer.action {
                TimerAction::NoteOn(note) => {
                    self.active.insert(note.id);
                    audio.play(note.row(), note.fret, self.sustain_secs);
                    events.push(RenderEvent::NoteActive(note.id));
                }
                TimerAction::NoteOff(id) => {
                    if self.active.remove(&id) {
                        events.push(RenderEvent::NoteReleased(id));
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PreviewAction {
    Strum { string: u8, fret: u8 },
    Release(NoteId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PreviewTimer {
    at_ms: f64,
    action: PreviewAction,
}

/// Drives playback sessions and one-off previews from a single clock.
///
/// Nothing here runs on its own: the owner calls [`tick`](Scheduler::tick)
/// once per frame with the current time and every due callback fires inside
/// that call.
#[derive(Debug, Default)]
pub struct Scheduler {
    session: Option<PlaybackSession>,
    start_beat: u32,
    previews: Vec<PreviewTimer>,
    preview_active: BTreeSet<NoteId>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// Play-head position, `None` when idle.
    pub fn progress(&self) -> Option<f64> {
        self.session.as_ref().map(|s| s.progress)
    }

    pub fn start_beat(&self) -> u32 {
        self.start_beat
    }

    /// Move the start marker. Takes effect on the next session.
    pub fn set_start_beat(&mut self, beat: u32, timeline_len: u32) -> Result<(), GridError> {
        if beat >= timeline_len {
            return Err(GridError::InvalidBeat {
                beat,
                length: timeline_len,
            });
        }
        self.start_beat = beat;
        Ok(())
    }

    /// Notes currently highlighted by playback or a preview.
    pub fn active_note_ids(&self) -> BTreeSet<NoteId> {
        let mut ids = self.preview_active.clone();
        if let Some(session) = &self.session {
            ids.extend(session.active.iter().copied());
        }
        ids
    }

    /// Begin a pass from the start marker. Returns `false` when already
    /// playing or when there is nothing to play.
    pub fn start(
        &mut self,
        now: f64,
        grid: &Grid,
        settings: &PlaybackSettings,
        events: &mut Vec<RenderEvent>,
    ) -> bool {
        if self.session.is_some() || grid.is_empty() {
            return false;
        }
        self.arm(now, grid, settings, events);
        true
    }

    fn arm(&mut self, now: f64, grid: &Grid, settings: &PlaybackSettings, events: &mut Vec<RenderEvent>) {
        let session = PlaybackSession::new(now, grid, self.start_beat, settings);
        log::debug!(
            "playback from {} over {} beats ({} timer(s), {:.0} ms)",
            MeasurePosition::of(self.start_beat),
            session.timeline_len,
            session.timers.len(),
            session.active_ms,
        );
        self.session = Some(session);
        events.push(RenderEvent::PlaybackStarted {
            start_beat: self.start_beat,
        });
        events.push(RenderEvent::Progress(0.0));
    }

    /// Cancel every pending note callback and clear all highlights. Safe to
    /// call when idle.
    pub fn pause(&mut self, events: &mut Vec<RenderEvent>) {
        let session = self.session.take();
        for id in std::mem::take(&mut self.preview_active) {
            events.push(RenderEvent::NoteReleased(id));
        }
        let Some(session) = session else {
            return;
        };
        for id in session.active {
            events.push(RenderEvent::NoteReleased(id));
        }
        log::debug!("playback stopped, {} timer(s) dropped", session.timers.len());
        events.push(RenderEvent::PlaybackStopped);
    }

    /// Advance to `now`: fire due previews and note callbacks, then update the
    /// play-head. A finished pass stops, and restarts when looping.
    pub fn tick(
        &mut self,
        now: f64,
        grid: &Grid,
        settings: &PlaybackSettings,
        audio: &mut dyn AudioService,
        events: &mut Vec<RenderEvent>,
    ) {
        self.fire_previews(now, settings, audio, events);
        self.sync_timeline(now, grid, settings, events);

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let elapsed = now - session.started_at;
        session.fire_due(elapsed, audio, events);

        let progress = (elapsed - session.visual_lag_ms) / session.active_ms;
        if progress.is_nan() || progress >= 1.0 {
            self.pause(events);
            if settings.looping {
                log::debug!("loop restart");
                self.arm(now, grid, settings, events);
            }
            return;
        }

        session.progress = progress.max(0.0);
        events.push(RenderEvent::Progress(session.progress));
    }

    /// Restart the pass from the start marker if the timeline grew since it
    /// began. Also drops a start marker that no longer fits the timeline.
    pub fn sync_timeline(
        &mut self,
        now: f64,
        grid: &Grid,
        settings: &PlaybackSettings,
        events: &mut Vec<RenderEvent>,
    ) {
        let timeline_len = grid.timeline_len();
        if self.start_beat >= timeline_len {
            log::debug!("start marker {} past the end, reset", self.start_beat);
            self.start_beat = 0;
        }

        let grew = self
            .session
            .as_ref()
            .is_some_and(|s| timeline_len > s.timeline_len);
        if grew {
            // restarts at the start marker rather than beat 0, so a marked
            // section keeps playing while the grid grows
            log::debug!("timeline grew to {timeline_len} beats during playback, restarting");
            self.pause(events);
            self.arm(now, grid, settings, events);
        }
    }

    /// Audition a single pill and keep it highlighted for its length.
    pub fn preview_note(
        &mut self,
        now: f64,
        note: &Note,
        settings: &PlaybackSettings,
        audio: &mut dyn AudioService,
        events: &mut Vec<RenderEvent>,
    ) {
        if note.silent {
            return;
        }
        audio.play(note.row(), note.fret, settings.sustain_secs);
        events.push(flash(note.string, note.fret, settings));

        self.preview_active.insert(note.id);
        events.push(RenderEvent::NoteActive(note.id));
        self.schedule_preview(PreviewTimer {
            at_ms: now + f64::from(note.duration) * BASE_BEAT_MS,
            action: PreviewAction::Release(note.id),
        });
    }

    /// Strum a chord entry bass first with a fixed gap between strings.
    pub fn preview_chord(
        &mut self,
        now: f64,
        tones: &[ChordTone],
        settings: &PlaybackSettings,
        audio: &mut dyn AudioService,
        events: &mut Vec<RenderEvent>,
    ) {
        for (index, tone) in tones.iter().enumerate() {
            self.schedule_preview(PreviewTimer {
                at_ms: now + index as f64 * CHORD_PREVIEW_GAP_MS,
                action: PreviewAction::Strum {
                    string: tone.string,
                    fret: tone.fret,
                },
            });
        }
        // the bass string sounds right away
        self.fire_previews(now, settings, audio, events);
    }

    pub fn pending_previews(&self) -> usize {
        self.previews.len()
    }

    fn schedule_preview(&mut self, timer: PreviewTimer) {
        self.previews.push(timer);
        self.previews.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));
    }

    fn fire_previews(
        &mut self,
        now: f64,
        settings: &PlaybackSettings,
        audio: &mut dyn AudioService,
        events: &mut Vec<RenderEvent>,
    ) {
        let due = self.previews.partition_point(|t| t.at_ms <= now);
        for timer in self.previews.drain(..due) {
            match timer.action {
                PreviewAction::Strum { string, fret } => {
                    audio.play(string.saturating_sub(1), fret, settings.sustain_secs);
                    events.push(flash(string, fret, settings));
                }
                PreviewAction::Release(id) => {
                    if self.preview_active.remove(&id) {
                        events.push(RenderEvent::NoteReleased(id));
                    }
                }
            }
        }
    }
}

fn flash(string: u8, fret: u8, settings: &PlaybackSettings) -> RenderEvent {
    RenderEvent::Flash {
        string,
        fret,
        hold_ms: settings.sustain_secs * 1000.0,
    }
}
