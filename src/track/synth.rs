// Track Synthesis - Measures to absolute-time notes
// Slot timing here is tempo-derived; the refinement stages then impose
// the fixed beat duration and re-join the groups seamlessly

use crate::score::{Measure, TimeSignature};
use crate::track::model::{ChordTrack, Note};

/// Velocity notes are born with; the volume normalizer overwrites it
/// from the source's average before output
pub const SYNTH_VELOCITY: u8 = 90;

/// Convert measures into a flat chord track with monotonically
/// increasing start times.
///
/// Slot `i` of measure `m` starts at `(m * numerator + i) * slot_dur`
/// where `slot_dur = 60 / bpm`. Rest slots produce a single placeholder
/// note spanning the slot; triads produce one note per pitch, all
/// sharing the slot's start and end.
pub fn synthesize_track(
    measures: &[Measure],
    time_signature: &TimeSignature,
    bpm: u32,
) -> ChordTrack {
    let slot_duration = 60.0 / bpm as f64;
    let numerator = time_signature.numerator as usize;

    let mut track = ChordTrack::new("Chords", 0);
    for (m, measure) in measures.iter().enumerate() {
        for (i, chord) in measure.slots.iter().enumerate() {
            let start = (m * numerator + i) as f64 * slot_duration;
            let end = start + slot_duration;

            if chord.is_rest() {
                track.notes.push(Note::rest_placeholder(start, end));
            } else {
                for &pitch in chord.pitches() {
                    track
                        .notes
                        .push(Note::pitched(pitch, SYNTH_VELOCITY, start, end));
                }
            }
        }
    }
    track
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::build_measures;
    use crate::theory::{Key, expand_progression};

    #[test]
    fn test_slot_timing() {
        let key = Key::parse("C", "Major").unwrap();
        let progression = expand_progression(&key, &[1, 4]).unwrap();
        let ts = TimeSignature::new(4, 4).unwrap();
        let measures = build_measures(&progression, &ts, 1);

        // At 120 BPM a slot lasts 0.5s
        let track = synthesize_track(&measures, &ts, 120);

        // 2 measures x 4 slots x 3 pitches
        assert_eq!(track.notes.len(), 24);

        // First slot of the second measure starts at slot index 4
        let second_measure_start = 4.0 * 0.5;
        let note = track
            .notes
            .iter()
            .find(|n| (n.start - second_measure_start).abs() < 1e-9)
            .unwrap();
        assert!((note.end - note.start - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_rest_slot_produces_single_placeholder() {
        let key = Key::parse("C", "Major").unwrap();
        let progression = expand_progression(&key, &[0]).unwrap();
        let ts = TimeSignature::new(4, 4).unwrap();
        let measures = build_measures(&progression, &ts, 1);

        let track = synthesize_track(&measures, &ts, 90);

        assert_eq!(track.notes.len(), 4);
        assert!(track.notes.iter().all(|n| n.is_placeholder()));
        assert_eq!(track.audible_count(), 0);
    }

    #[test]
    fn test_starts_monotonic() {
        let key = Key::parse("G", "minor").unwrap();
        let progression = expand_progression(&key, &[1, 0, 5, 2]).unwrap();
        let ts = TimeSignature::new(3, 4).unwrap();
        let measures = build_measures(&progression, &ts, 2);

        let track = synthesize_track(&measures, &ts, 100);
        for pair in track.notes.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
    }
}
