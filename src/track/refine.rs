// Track Refinement - The in-order transform stages applied to a
// synthesized chord track before merging:
// mark -> normalize volume -> fix durations -> group -> transpose -> strip
//
// Placeholders stay in place through grouping so neighboring chords keep
// their spacing, and are only stripped at the very end.

use crate::track::model::{ChordTrack, NoteKind};

/// Start-time tolerance for recovering "simultaneous chord" groups (1 ms)
pub const GROUP_TOLERANCE: f64 = 0.001;

/// Tag every pitch-0 note of a non-percussion track as a rest
/// placeholder. Synthesis already tags them at creation; this stage
/// re-asserts the invariant for tracks that arrive untagged (e.g. after
/// a decode round-trip). Idempotent.
pub fn mark_placeholders(track: &mut ChordTrack) {
    if track.is_percussion {
        return;
    }
    for note in &mut track.notes {
        if note.pitch == 0 {
            note.kind = NoteKind::RestPlaceholder;
        }
    }
}

/// Set every audible note's velocity to the desired volume, leaving
/// placeholders untouched. Idempotent.
pub fn normalize_volume(track: &mut ChordTrack, volume: u8) {
    let volume = volume.min(127);
    for note in &mut track.notes {
        if !note.is_placeholder() {
            note.velocity = volume;
        }
    }
}

/// Clamp every audible note to exactly `beat_duration` seconds,
/// discarding whatever duration synthesis produced. All chords in a
/// slot get identical, predictable length regardless of detected tempo.
pub fn fix_durations(track: &mut ChordTrack, beat_duration: f64) {
    if track.is_percussion {
        return;
    }
    for note in &mut track.notes {
        if !note.is_placeholder() {
            note.end = note.start + beat_duration;
        }
    }
}

/// Remove the gaps and overlaps that fixed durations introduced between
/// neighboring slots.
///
/// Notes are sorted by start and partitioned into groups whose starts
/// lie within `tolerance` of the group's first member, recovering the
/// original simultaneous-chord structure. Each group after the first is
/// shifted so its start equals the previous group's latest end; every
/// note keeps its own duration. Idempotent: a shift that preserves
/// relative order leaves group boundaries unchanged.
pub fn group_notes(track: &mut ChordTrack, tolerance: f64) {
    if track.is_percussion || track.notes.is_empty() {
        return;
    }
    track.sort_by_start();

    // Group boundaries as index ranges into the sorted note list
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut group_start = 0;
    for i in 1..track.notes.len() {
        if (track.notes[i].start - track.notes[group_start].start).abs() > tolerance {
            groups.push((group_start, i));
            group_start = i;
        }
    }
    groups.push((group_start, track.notes.len()));

    for g in 1..groups.len() {
        let (prev_lo, prev_hi) = groups[g - 1];
        let prev_end = track.notes[prev_lo..prev_hi]
            .iter()
            .map(|n| n.end)
            .fold(f64::NEG_INFINITY, f64::max);

        let (lo, hi) = groups[g];
        for note in &mut track.notes[lo..hi] {
            let duration = note.duration();
            note.start = prev_end;
            note.end = note.start + duration;
        }
    }
}

/// Shift every audible note of a non-percussion track by `semitones`,
/// clamped to the valid MIDI pitch range. Placeholders stay at pitch 0,
/// their identifying anchor.
pub fn transpose(track: &mut ChordTrack, semitones: i32) {
    if track.is_percussion {
        return;
    }
    for note in &mut track.notes {
        if !note.is_placeholder() {
            note.pitch = (note.pitch as i32 + semitones).clamp(0, 127) as u8;
        }
    }
}

/// Drop every rest placeholder; their timing role is over once grouping
/// and transposition have run.
pub fn strip_placeholders(track: &mut ChordTrack) {
    track.notes.retain(|note| !note.is_placeholder());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::model::{ChordTrack, Note};

    fn triad_at(track: &mut ChordTrack, pitches: [u8; 3], start: f64, end: f64) {
        for pitch in pitches {
            track.notes.push(Note::pitched(pitch, 90, start, end));
        }
    }

    fn test_track() -> ChordTrack {
        let mut track = ChordTrack::new("Chords", 0);
        triad_at(&mut track, [60, 64, 67], 0.0, 0.667);
        triad_at(&mut track, [62, 65, 69], 0.667, 1.333);
        track.notes.push(Note::rest_placeholder(1.333, 2.0));
        triad_at(&mut track, [65, 69, 72], 2.0, 2.667);
        track
    }

    #[test]
    fn test_mark_placeholders_idempotent() {
        let mut track = test_track();
        // Simulate an untagged pitch-0 note from a decode round-trip
        track.notes.push(Note::pitched(0, 64, 2.667, 3.0));

        mark_placeholders(&mut track);
        assert_eq!(track.notes.iter().filter(|n| n.is_placeholder()).count(), 2);

        mark_placeholders(&mut track);
        assert_eq!(track.notes.iter().filter(|n| n.is_placeholder()).count(), 2);
    }

    #[test]
    fn test_normalize_volume_skips_placeholders() {
        let mut track = test_track();
        normalize_volume(&mut track, 77);

        for note in &track.notes {
            if note.is_placeholder() {
                assert_eq!(note.velocity, 0);
            } else {
                assert_eq!(note.velocity, 77);
            }
        }
    }

    #[test]
    fn test_fix_durations() {
        let mut track = test_track();
        fix_durations(&mut track, 0.5);

        for note in &track.notes {
            if !note.is_placeholder() {
                assert!((note.duration() - 0.5).abs() < 1e-9);
            }
        }
        // Placeholder keeps its synthesized span
        let rest = track.notes.iter().find(|n| n.is_placeholder()).unwrap();
        assert!((rest.duration() - 0.667).abs() < 1e-9);
    }

    #[test]
    fn test_group_notes_removes_gaps() {
        let mut track = test_track();
        // Fixed durations leave a gap before the second group
        fix_durations(&mut track, 0.5);
        group_notes(&mut track, GROUP_TOLERANCE);

        // Second chord now starts exactly where the first ends
        assert!((track.notes[3].start - 0.5).abs() < 1e-9);
        // Rest slot follows the second chord's end
        let rest = track.notes.iter().find(|n| n.is_placeholder()).unwrap();
        assert!((rest.start - 1.0).abs() < 1e-9);
        // Durations are preserved by the shift
        assert!((track.notes[3].duration() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_group_notes_idempotent() {
        let mut track = test_track();
        fix_durations(&mut track, 0.5);

        group_notes(&mut track, GROUP_TOLERANCE);
        let once = track.notes.clone();
        group_notes(&mut track, GROUP_TOLERANCE);

        assert_eq!(track.notes, once);
    }

    #[test]
    fn test_rest_spacing_survives_grouping() {
        // The placeholder occupies its slot, so the chord after the
        // rest lands after the rest's full span, not directly after the
        // previous chord
        let mut track = test_track();
        fix_durations(&mut track, 0.5);
        group_notes(&mut track, GROUP_TOLERANCE);

        let rest_end = track
            .notes
            .iter()
            .find(|n| n.is_placeholder())
            .unwrap()
            .end;
        let last_chord_start = track.notes.last().unwrap().start;
        assert!((last_chord_start - rest_end).abs() < 1e-9);
    }

    #[test]
    fn test_transpose_clamps_and_skips_placeholders() {
        let mut track = test_track();
        transpose(&mut track, -24);

        assert_eq!(track.notes[0].pitch, 36);
        let rest = track.notes.iter().find(|n| n.is_placeholder()).unwrap();
        assert_eq!(rest.pitch, 0);

        transpose(&mut track, -127);
        for note in track.notes.iter().filter(|n| !n.is_placeholder()) {
            assert_eq!(note.pitch, 0);
        }

        transpose(&mut track, 500);
        for note in track.notes.iter().filter(|n| !n.is_placeholder()) {
            assert_eq!(note.pitch, 127);
        }
    }

    #[test]
    fn test_strip_placeholders_removes_all_and_only() {
        let mut track = test_track();
        let audible_before = track.audible_count();

        strip_placeholders(&mut track);

        assert_eq!(track.notes.len(), audible_before);
        assert!(track.notes.iter().all(|n| !n.is_placeholder()));
    }

    #[test]
    fn test_percussion_exempt_from_pitch_transforms() {
        let mut track = test_track();
        track.is_percussion = true;
        let before = track.notes.clone();

        transpose(&mut track, -24);
        fix_durations(&mut track, 0.5);
        group_notes(&mut track, GROUP_TOLERANCE);

        assert_eq!(track.notes, before);
    }
}
