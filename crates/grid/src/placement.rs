//! Pure functions for note placement, kept free of grid state so they can be
//! tested in isolation.

use crate::NoteId;
use crate::note::{Note, NoteSpec, ranges_overlap};

/// Earliest beat `>= 0` at which `[beat, beat + duration - 1]` intersects none
/// of `occupied`.
///
/// This is the reject-and-shift policy used by auto-placement: nothing is ever
/// overwritten, the candidate slides right until it fits.
pub fn first_free_beat<'a, I>(occupied: I, duration: u32) -> u32
where
    I: IntoIterator<Item = &'a Note>,
{
    let duration = duration.max(1);
    let mut spans: Vec<(u32, u32)> = occupied
        .into_iter()
        .map(|n| (n.beat, n.last_beat()))
        .collect();
    spans.sort_unstable();

    let mut beat = 0u32;
    loop {
        let last = beat.saturating_add(duration - 1);
        match spans
            .iter()
            .find(|(start, end)| ranges_overlap(beat, last, *start, *end))
        {
            // jump past the blocker instead of stepping one beat at a time
            Some((_, end)) => beat = end.saturating_add(1),
            None => return beat,
        }
    }
}

/// Result of clearing room for a set of candidates.
pub struct Overwrite {
    /// Notes to keep.
    pub kept: Vec<Note>,
    /// Notes removed because a candidate landed on them.
    pub removed: Vec<Note>,
}

/// Remove every existing note that shares a lane with, and intersects the
/// range of, any candidate. The candidates take priority (overwrite-on-drop).
///
/// `ignore` is skipped entirely - used for the note being moved.
pub fn clear_lanes(existing: &[Note], candidates: &[NoteSpec], ignore: Option<NoteId>) -> Overwrite {
    let mut kept = Vec::with_capacity(existing.len());
    let mut removed = Vec::new();

    for note in existing {
        if Some(note.id) == ignore {
            continue;
        }
        let collides = candidates
            .iter()
            .any(|c| note.lane() == c.lane() && note.overlaps(c.beat, c.last_beat()));
        if collides {
            removed.push(*note);
        } else {
            kept.push(*note);
        }
    }

    Overwrite { kept, removed }
}

/// True when no two notes in the same lane overlap.
pub fn lanes_disjoint(notes: &[Note]) -> bool {
    notes.iter().enumerate().all(|(i, a)| {
        notes[i + 1..]
            .iter()
            .all(|b| a.lane() != b.lane() || !a.overlaps(b.beat, b.last_beat()))
    })
}

/// Whether no two candidates of one group share a lane and a beat.
pub fn group_disjoint(candidates: &[NoteSpec]) -> bool {
    candidates.iter().enumerate().all(|(i, a)| {
        candidates[i + 1..].iter().all(|b| {
            a.lane() != b.lane() || !ranges_overlap(a.beat, a.last_beat(), b.beat, b.last_beat())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: u64, string: u8, beat: u32, duration: u32) -> Note {
        Note {
            id: NoteId(id),
            string,
            fret: 0,
            beat,
            duration,
            silent: false,
        }
    }

    fn rest(id: u64, beat: u32, duration: u32) -> Note {
        Note {
            silent: true,
            ..note(id, 1, beat, duration)
        }
    }

    #[test]
    fn test_first_free_beat_on_empty_grid() {
        assert_eq!(first_free_beat(&[], 4), 0);
    }

    #[test]
    fn test_first_free_beat_skips_any_string() {
        // collision check is range-only: string 6 still blocks beats 0..=3
        let notes = vec![note(1, 6, 0, 4)];
        assert_eq!(first_free_beat(&notes, 2), 4);
    }

    #[test]
    fn test_first_free_beat_finds_gap() {
        // [0..=1] busy, [2..=3] free, [4..=7] busy
        let notes = vec![note(1, 1, 0, 2), note(2, 3, 4, 4)];
        assert_eq!(first_free_beat(&notes, 2), 2);
        // a 3-beat span does not fit the 2-beat gap
        assert_eq!(first_free_beat(&notes, 3), 8);
    }

    #[test]
    fn test_first_free_beat_with_unsorted_overlapping_blockers() {
        let notes = vec![note(1, 1, 6, 2), note(2, 2, 0, 7), note(3, 3, 1, 1)];
        assert_eq!(first_free_beat(&notes, 1), 8);
    }

    #[test]
    fn test_clear_lanes_only_touches_same_string() {
        let existing = vec![note(1, 1, 0, 4), note(2, 2, 0, 4), note(3, 1, 4, 4)];
        let candidates = [NoteSpec::audible(1, 5, 2, 1)];

        let result = clear_lanes(&existing, &candidates, None);

        let kept: Vec<u64> = result.kept.iter().map(|n| n.id.0).collect();
        assert_eq!(kept, vec![2, 3]);
        assert_eq!(result.removed.len(), 1);
        assert_eq!(result.removed[0].id, NoteId(1));
    }

    #[test]
    fn test_clear_lanes_keeps_rest_under_audible_note() {
        // rests sit on the placeholder string but live in their own lane
        let existing = vec![rest(1, 0, 4)];
        let candidates = [NoteSpec::audible(1, 0, 0, 1)];

        let result = clear_lanes(&existing, &candidates, None);

        assert_eq!(result.kept.len(), 1);
        assert!(result.removed.is_empty());
    }

    #[test]
    fn test_clear_lanes_skips_ignored_note() {
        let existing = vec![note(1, 1, 0, 2), note(2, 3, 0, 2)];
        let candidates = [NoteSpec::audible(3, 0, 1, 2)];

        let result = clear_lanes(&existing, &candidates, Some(NoteId(1)));

        assert!(result.kept.is_empty(), "ignored note is dropped from the output");
        assert_eq!(result.removed[0].id, NoteId(2));
    }

    #[test]
    fn test_lanes_disjoint() {
        assert!(lanes_disjoint(&[note(1, 1, 0, 2), note(2, 1, 2, 2), note(3, 2, 0, 4)]));
        assert!(!lanes_disjoint(&[note(1, 1, 0, 2), note(2, 1, 1, 2)]));
        assert!(lanes_disjoint(&[note(1, 1, 0, 2), rest(2, 0, 2)]));
        assert!(!lanes_disjoint(&[rest(1, 0, 2), rest(2, 1, 1)]));
    }

    #[test]
    fn test_group_disjoint() {
        assert!(group_disjoint(&[NoteSpec::audible(1, 0, 0, 2), NoteSpec::audible(1, 0, 2, 2)]));
        assert!(group_disjoint(&[NoteSpec::audible(1, 0, 0, 4), NoteSpec::rest(0, 4)]));
        assert!(!group_disjoint(&[NoteSpec::audible(3, 0, 0, 4), NoteSpec::audible(3, 5, 3, 1)]));
        assert!(!group_disjoint(&[NoteSpec::rest(0, 2), NoteSpec::rest(1, 2)]));
    }
}
