// Chord Track Model - Owned notes with explicit placeholder tagging
// Rest placeholders are first-class from creation, not a post-hoc flag

use serde::{Deserialize, Serialize};

/// Whether a note is audible or a rest placeholder.
///
/// Placeholders occupy their time slot through the grouping stage so
/// that surrounding chords keep correct spacing, then get stripped
/// before output. They are anchored at pitch 0, which is reserved for
/// this purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Pitched,
    RestPlaceholder,
}

/// A note with absolute timing in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// MIDI pitch (0-127); 0 is reserved for rest placeholders
    pub pitch: u8,

    /// MIDI velocity (0-127)
    pub velocity: u8,

    /// Absolute start time in seconds
    pub start: f64,

    /// Absolute end time in seconds
    pub end: f64,

    /// Audible note or rest placeholder
    pub kind: NoteKind,
}

impl Note {
    /// Create an audible note
    pub fn pitched(pitch: u8, velocity: u8, start: f64, end: f64) -> Self {
        Note {
            pitch: pitch.min(127),
            velocity: velocity.min(127),
            start,
            end,
            kind: NoteKind::Pitched,
        }
    }

    /// Create a rest placeholder spanning a slot
    pub fn rest_placeholder(start: f64, end: f64) -> Self {
        Note {
            pitch: 0,
            velocity: 0,
            start,
            end,
            kind: NoteKind::RestPlaceholder,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == NoteKind::RestPlaceholder
    }
}

/// One instrument's worth of generated notes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChordTrack {
    /// Track name written into the output MIDI
    pub name: String,

    /// General MIDI program number (0 = acoustic grand piano)
    pub program: u8,

    /// Percussion tracks are exempt from pitch transforms
    pub is_percussion: bool,

    /// All notes, audible and placeholder
    pub notes: Vec<Note>,
}

impl ChordTrack {
    /// Create a new empty track
    pub fn new(name: impl Into<String>, program: u8) -> Self {
        ChordTrack {
            name: name.into(),
            program,
            is_percussion: false,
            notes: Vec::new(),
        }
    }

    /// Sort notes by start time
    pub fn sort_by_start(&mut self) {
        self.notes.sort_by(|a, b| {
            a.start
                .partial_cmp(&b.start)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Count of audible (non-placeholder) notes
    pub fn audible_count(&self) -> usize {
        self.notes.iter().filter(|n| !n.is_placeholder()).count()
    }
}
