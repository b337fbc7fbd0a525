// Pipeline - Orchestrates analysis, synthesis, refinement, and merge
// One sequential run per request; concurrent runs are isolated by
// per-invocation workspace directories

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::midi::{MidiError, SourceMidi, merge_chord_track};
use crate::score::{ScoreError, TimeSignature, build_measures, repeats_needed};
use crate::theory::{Key, TheoryError, expand_progression};
use crate::track::{
    GROUP_TOLERANCE, fix_durations, group_notes, mark_placeholders, normalize_volume,
    strip_placeholders, synthesize_track, transpose,
};

/// Output filename inside a run's workspace
pub const OUTPUT_FILE_NAME: &str = "combined_output.mid";

/// Duration fallback when the source yields no tempo information
pub const FALLBACK_DURATION: f64 = 60.0;

/// Velocity fallback when the source has no notes to average
pub const DEFAULT_VELOCITY: u8 = 90;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    Theory(#[from] TheoryError),

    #[error("Invalid request: {0}")]
    Score(#[from] ScoreError),

    #[error("Tempo must be a positive integer")]
    InvalidTempo,

    #[error("Progression must not be empty")]
    EmptyProgression,

    #[error(transparent)]
    Midi(#[from] MidiError),

    #[error("Workspace error: {0}")]
    Io(#[from] std::io::Error),
}

/// Request-level parameters for one accompaniment run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChordRequest {
    /// Key letter used when the source has no key signature
    pub key: String,

    /// "Major" or "Minor", case-insensitive
    pub mode: String,

    /// Scale degrees in [0, 7]; 0 means rest
    pub progression: Vec<u8>,

    /// Time signature controlling slots per measure and the fixed
    /// beat duration
    pub time_signature: TimeSignature,

    /// Fallback BPM, used only when tempo estimation fails
    pub tempo: u32,

    /// Semitone offset applied to the finished chords
    pub transpose: i32,
}

impl Default for ChordRequest {
    fn default() -> Self {
        ChordRequest {
            key: "C".to_string(),
            mode: "Major".to_string(),
            progression: vec![2, 5, 1, 6],
            time_signature: TimeSignature {
                numerator: 4,
                denominator: 4,
            },
            tempo: 90,
            // Two octaves down, the accompaniment register
            transpose: -24,
        }
    }
}

/// Run the full pipeline: analyze the source, synthesize a chord track
/// covering its duration, refine it stage by stage, and merge it back
/// into the source. Returns the combined MIDI bytes.
pub fn run(source_bytes: &[u8], request: &ChordRequest) -> Result<Vec<u8>, PipelineError> {
    if request.progression.is_empty() {
        return Err(PipelineError::EmptyProgression);
    }
    if request.tempo == 0 {
        return Err(PipelineError::InvalidTempo);
    }
    let time_signature = TimeSignature::new(
        request.time_signature.numerator,
        request.time_signature.denominator,
    )?;

    let source = SourceMidi::parse(source_bytes)?;

    let detected_key = source.detect_key(&request.key);
    let key = Key::parse(&detected_key, &request.mode)?;
    let chords = expand_progression(&key, &request.progression)?;
    log::info!(
        "Expanding {} degrees in {} {}",
        request.progression.len(),
        detected_key,
        request.mode
    );

    let (bpm, duration) = match source.tempo_and_duration() {
        Ok((bpm, duration)) => {
            log::info!("Source: {} BPM, {:.2}s", bpm, duration);
            (bpm, duration)
        }
        Err(e) => {
            log::warn!(
                "Tempo estimation failed ({}), falling back to {} BPM over {}s",
                e,
                request.tempo,
                FALLBACK_DURATION
            );
            (request.tempo, FALLBACK_DURATION)
        }
    };

    let beat_duration = time_signature.beat_duration();
    let repeats = repeats_needed(duration, &time_signature, chords.len());
    let measures = build_measures(&chords, &time_signature, repeats);
    log::info!(
        "Tiling {} measures ({} repeats of the progression)",
        measures.len(),
        repeats
    );

    let mut track = synthesize_track(&measures, &time_signature, bpm);
    mark_placeholders(&mut track);
    normalize_volume(&mut track, source.average_velocity(DEFAULT_VELOCITY));
    fix_durations(&mut track, beat_duration);
    group_notes(&mut track, GROUP_TOLERANCE);
    transpose(&mut track, request.transpose);
    strip_placeholders(&mut track);
    log::info!("Chord track holds {} audible notes", track.notes.len());

    Ok(merge_chord_track(source_bytes, &track, &source)?)
}

/// An isolated temporary namespace for one pipeline invocation.
///
/// Each run gets a directory named by a fresh UUID, so concurrent runs
/// never read or overwrite each other's artifacts.
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    dir: PathBuf,
}

impl Workspace {
    /// Create a fresh workspace directory under `base`
    pub fn create(base: &Path) -> std::io::Result<Self> {
        let id = Uuid::new_v4();
        let dir = base.join(id.to_string());
        fs::create_dir_all(&dir)?;
        Ok(Workspace { id, dir })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of this run's merged output file
    pub fn output_path(&self) -> PathBuf {
        self.dir.join(OUTPUT_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u4, u7};
    use midly::{
        Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    };

    /// A source at 120 BPM / 480 PPQ holding one long channel-0 note of
    /// the given length in seconds, with an optional key signature
    fn source_with_duration(seconds: f64, key_signature: Option<i8>) -> Vec<u8> {
        let mut track = Track::new();
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(500_000.into())),
        });
        if let Some(sharps) = key_signature {
            track.push(TrackEvent {
                delta: 0.into(),
                kind: TrackEventKind::Meta(MetaMessage::KeySignature(sharps, false)),
            });
        }
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Midi {
                channel: u4::from(0),
                message: MidiMessage::NoteOn {
                    key: u7::from(72),
                    vel: u7::from(64),
                },
            },
        });
        // 120 BPM at 480 PPQ: 960 ticks per second
        let ticks = (seconds * 960.0).round() as u32;
        track.push(TrackEvent {
            delta: ticks.into(),
            kind: TrackEventKind::Midi {
                channel: u4::from(0),
                message: MidiMessage::NoteOff {
                    key: u7::from(72),
                    vel: u7::from(0),
                },
            },
        });
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        let smf = Smf {
            header: Header {
                format: Format::SingleTrack,
                timing: Timing::Metrical(480.into()),
            },
            tracks: vec![track],
        };
        let mut bytes = Vec::new();
        smf.write(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_end_to_end_two_five_one_six() {
        let bytes = source_with_duration(60.0, None);
        let request = ChordRequest::default();

        let merged = run(&bytes, &request).unwrap();
        let result = SourceMidi::parse(&merged).unwrap();

        // Source melody plus the generated chord instrument
        assert_eq!(result.instruments.len(), 2);
        let chords = &result.instruments[1];
        assert!(!chords.is_percussion);

        // 60s at measure length 2.0 -> 30 measures -> 8 repeats of 4
        // chords -> 32 measures of 4 slots, 3 pitches each
        assert_eq!(chords.notes.len(), 32 * 4 * 3);

        // First chord is the ii triad of C major (D-F-A), two octaves
        // down: 38, 41, 45
        let mut first: Vec<u8> = chords.notes.iter().take(3).map(|n| n.pitch).collect();
        first.sort();
        assert_eq!(first, vec![38, 41, 45]);

        // Velocity normalized to the source's average
        assert!(chords.notes.iter().all(|n| n.velocity == 64));
    }

    #[test]
    fn test_end_to_end_rest_measure_spaces_neighbors() {
        // 8s source: 4 measures, one repeat of [2,5,0,1]
        let bytes = source_with_duration(8.0, None);
        let request = ChordRequest {
            progression: vec![2, 5, 0, 1],
            ..Default::default()
        };

        let merged = run(&bytes, &request).unwrap();
        let result = SourceMidi::parse(&merged).unwrap();
        let chords = &result.instruments[1];

        // Rest measure contributes no audible notes
        assert_eq!(chords.notes.len(), 3 * 4 * 3);

        // The rest measure spans [4.0, 6.0): nothing audible starts
        // there, and the following chord lands at 6.0 exactly
        assert!(!chords
            .notes
            .iter()
            .any(|n| n.start >= 4.0 && n.start < 5.99));
        assert!(chords.notes.iter().any(|n| (n.start - 6.0).abs() < 0.01));
    }

    #[test]
    fn test_detected_key_overrides_request_key() {
        // One sharp in the source key signature -> G major triads even
        // though the request says C
        let bytes = source_with_duration(4.0, Some(1));
        let request = ChordRequest {
            progression: vec![1],
            transpose: 0,
            ..Default::default()
        };

        let merged = run(&bytes, &request).unwrap();
        let result = SourceMidi::parse(&merged).unwrap();
        let chords = &result.instruments[1];

        // I of G major = G-B-D
        let mut first: Vec<u8> = chords.notes.iter().take(3).map(|n| n.pitch).collect();
        first.sort();
        assert_eq!(first, vec![67, 71, 74]);
    }

    #[test]
    fn test_config_errors_fail_fast() {
        let bytes = source_with_duration(4.0, None);

        let bad_mode = ChordRequest {
            mode: "dorian".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            run(&bytes, &bad_mode),
            Err(PipelineError::Theory(_))
        ));

        let bad_degree = ChordRequest {
            progression: vec![2, 9],
            ..Default::default()
        };
        assert!(matches!(
            run(&bytes, &bad_degree),
            Err(PipelineError::Theory(_))
        ));

        let empty = ChordRequest {
            progression: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(
            run(&bytes, &empty),
            Err(PipelineError::EmptyProgression)
        ));

        let zero_tempo = ChordRequest {
            tempo: 0,
            ..Default::default()
        };
        assert!(matches!(
            run(&bytes, &zero_tempo),
            Err(PipelineError::InvalidTempo)
        ));

        let bad_time_signature = ChordRequest {
            time_signature: TimeSignature {
                numerator: 0,
                denominator: 4,
            },
            ..Default::default()
        };
        assert!(matches!(
            run(&bytes, &bad_time_signature),
            Err(PipelineError::Score(_))
        ));
    }

    #[test]
    fn test_unreadable_source_fails() {
        let request = ChordRequest::default();
        assert!(matches!(
            run(b"not midi", &request),
            Err(PipelineError::Midi(_))
        ));
    }

    #[test]
    fn test_request_json_defaults() {
        let json = r#"{"progression": [1, 4, 5, 0], "tempo": 100}"#;
        let request: ChordRequest = serde_json::from_str(json).unwrap();

        // Unspecified fields take the documented defaults
        assert_eq!(request.key, "C");
        assert_eq!(request.mode, "Major");
        assert_eq!(request.progression, vec![1, 4, 5, 0]);
        assert_eq!(request.tempo, 100);
        assert_eq!(request.transpose, -24);
    }

    #[test]
    fn test_workspaces_are_isolated() {
        let base = tempfile::tempdir().unwrap();

        let first = Workspace::create(base.path()).unwrap();
        let second = Workspace::create(base.path()).unwrap();

        assert_ne!(first.id(), second.id());
        assert_ne!(first.output_path(), second.output_path());
        assert!(first.dir().is_dir());
        assert!(second.dir().is_dir());
    }
}
