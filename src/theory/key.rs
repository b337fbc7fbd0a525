// Keys, Modes, and Diatonic Scales
// Turns letter names and mode strings into concrete pitch material

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Semitone offsets of the major scale from its root (W-W-H-W-W-W-H)
pub const MAJOR_OFFSETS: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Semitone offsets of the natural minor scale from its root
pub const MINOR_OFFSETS: [u8; 7] = [0, 2, 3, 5, 7, 8, 10];

/// MIDI pitch of middle-octave C; diatonic triads are anchored here
pub const ROOT_OCTAVE_BASE: u8 = 60;

#[derive(Debug, Error)]
pub enum TheoryError {
    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),

    #[error("Unsupported key: {0}")]
    UnsupportedKey(String),

    #[error("Scale degree {0} out of range (expected 0-7, 0 meaning rest)")]
    DegreeOutOfRange(u8),

    #[error("Invalid progression entry: {0}")]
    InvalidProgression(String),
}

/// One of the seven natural note letters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    /// Pitch class of the natural letter (C = 0)
    pub fn pitch_class(&self) -> u8 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }
}

/// Accidental applied to a letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accidental {
    Natural,
    Sharp,
    Flat,
}

/// A spelled note name such as "C", "F#", or "Bb"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteName {
    pub letter: Letter,
    pub accidental: Accidental,
}

impl NoteName {
    pub fn new(letter: Letter, accidental: Accidental) -> Self {
        NoteName { letter, accidental }
    }

    /// Parse a note name string: a letter A-G optionally followed by '#' or 'b'
    pub fn parse(s: &str) -> Result<Self, TheoryError> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();

        let letter = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => Letter::C,
            Some('D') => Letter::D,
            Some('E') => Letter::E,
            Some('F') => Letter::F,
            Some('G') => Letter::G,
            Some('A') => Letter::A,
            Some('B') => Letter::B,
            _ => return Err(TheoryError::UnsupportedKey(trimmed.to_string())),
        };

        let accidental = match chars.next() {
            None => Accidental::Natural,
            Some('#') => Accidental::Sharp,
            Some('b') => Accidental::Flat,
            _ => return Err(TheoryError::UnsupportedKey(trimmed.to_string())),
        };

        if chars.next().is_some() {
            return Err(TheoryError::UnsupportedKey(trimmed.to_string()));
        }

        Ok(NoteName { letter, accidental })
    }

    /// Pitch class 0-11 with the accidental applied
    pub fn pitch_class(&self) -> u8 {
        let base = self.letter.pitch_class() as i8;
        let shifted = match self.accidental {
            Accidental::Natural => base,
            Accidental::Sharp => base + 1,
            Accidental::Flat => base - 1,
        };
        shifted.rem_euclid(12) as u8
    }
}

/// Diatonic mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    /// Parse a mode string, case-insensitively
    pub fn parse(s: &str) -> Result<Self, TheoryError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Ok(Mode::Major),
            "minor" => Ok(Mode::Minor),
            other => Err(TheoryError::UnsupportedMode(other.to_string())),
        }
    }

    /// Semitone offsets of this mode's 7-step scale
    pub fn scale_offsets(&self) -> [u8; 7] {
        match self {
            Mode::Major => MAJOR_OFFSETS,
            Mode::Minor => MINOR_OFFSETS,
        }
    }
}

/// A key: root note name plus mode, defining a 7-step diatonic scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub root: NoteName,
    pub mode: Mode,
}

impl Key {
    pub fn new(root: NoteName, mode: Mode) -> Self {
        Key { root, mode }
    }

    /// Parse a key from its string parts (e.g. "Bb", "minor")
    pub fn parse(root: &str, mode: &str) -> Result<Self, TheoryError> {
        Ok(Key {
            root: NoteName::parse(root)?,
            mode: Mode::parse(mode)?,
        })
    }

    /// Absolute MIDI pitch of the key's root in the middle octave
    pub fn root_pitch(&self) -> u8 {
        ROOT_OCTAVE_BASE + self.root.pitch_class()
    }

    /// Absolute pitch of a 0-based scale step, carrying the octave
    /// when the step wraps past the 7th
    fn step_pitch(&self, step: usize) -> u8 {
        let offsets = self.mode.scale_offsets();
        let octaves = (step / 7) as u8;
        self.root_pitch() + offsets[step % 7] + 12 * octaves
    }

    /// Build the diatonic triad on a scale degree (1-7):
    /// root, third, and fifth are scale steps d-1, d+1, and d+3
    pub fn triad(&self, degree: u8) -> Result<[u8; 3], TheoryError> {
        if !(1..=7).contains(&degree) {
            return Err(TheoryError::DegreeOutOfRange(degree));
        }
        let step = (degree - 1) as usize;
        Ok([
            self.step_pitch(step),
            self.step_pitch(step + 2),
            self.step_pitch(step + 4),
        ])
    }
}
