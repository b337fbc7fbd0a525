// Progression Expansion - Scale degrees to concrete chords
// Degree 0 is the reserved rest sentinel, 1-7 select diatonic triads

use serde::{Deserialize, Serialize};

use super::key::{Key, TheoryError};

/// A chord occupying one measure slot: either a rest or a diatonic triad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chord {
    /// A silent slot; occupies time but produces no audible pitches
    Rest,

    /// Root, third, and fifth as absolute MIDI pitches
    Triad([u8; 3]),
}

impl Chord {
    pub fn is_rest(&self) -> bool {
        matches!(self, Chord::Rest)
    }

    /// The chord's pitches; empty for a rest
    pub fn pitches(&self) -> &[u8] {
        match self {
            Chord::Rest => &[],
            Chord::Triad(pitches) => pitches,
        }
    }
}

/// Expand a degree sequence into chords for the given key.
///
/// 0 becomes `Chord::Rest`; 1-7 become diatonic triads. Any other value
/// is a configuration error and fails the whole expansion.
pub fn expand_progression(key: &Key, degrees: &[u8]) -> Result<Vec<Chord>, TheoryError> {
    degrees
        .iter()
        .map(|&degree| {
            if degree == 0 {
                Ok(Chord::Rest)
            } else {
                key.triad(degree).map(Chord::Triad)
            }
        })
        .collect()
}

/// Parse the comma-separated request form ("2,5,1,6") into degrees
pub fn parse_progression(s: &str) -> Result<Vec<u8>, TheoryError> {
    let degrees: Result<Vec<u8>, _> = s
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<u8>()
                .map_err(|_| TheoryError::InvalidProgression(part.trim().to_string()))
        })
        .collect();

    let degrees = degrees?;
    for &degree in &degrees {
        if degree > 7 {
            return Err(TheoryError::DegreeOutOfRange(degree));
        }
    }
    Ok(degrees)
}
