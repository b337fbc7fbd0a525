// Measures and Slot Layout - Time signatures, coverage math, chord tiling
// Beat durations come from a fixed table, not the detected tempo, so
// tempo-estimation noise cannot distort the chord rhythm

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::theory::Chord;

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Invalid time signature: {0}")]
    InvalidTimeSignature(String),
}

/// Musical time signature (numerator / denominator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Beats (slots) per measure
    pub numerator: u32,

    /// Note value that gets one beat (4 = quarter note)
    pub denominator: u32,
}

impl TimeSignature {
    pub fn new(numerator: u32, denominator: u32) -> Result<Self, ScoreError> {
        if numerator == 0 || denominator == 0 {
            return Err(ScoreError::InvalidTimeSignature(format!(
                "{}/{}",
                numerator, denominator
            )));
        }
        Ok(TimeSignature {
            numerator,
            denominator,
        })
    }

    /// Parse the request form "4,4"
    pub fn parse(s: &str) -> Result<Self, ScoreError> {
        let parts: Vec<&str> = s.split(',').map(|p| p.trim()).collect();
        if parts.len() != 2 {
            return Err(ScoreError::InvalidTimeSignature(s.to_string()));
        }
        let numerator = parts[0]
            .parse::<u32>()
            .map_err(|_| ScoreError::InvalidTimeSignature(s.to_string()))?;
        let denominator = parts[1]
            .parse::<u32>()
            .map_err(|_| ScoreError::InvalidTimeSignature(s.to_string()))?;
        TimeSignature::new(numerator, denominator)
    }

    /// Fixed seconds-per-beat for this signature.
    ///
    /// 4/4 -> 0.5, 3/4 -> 0.66, 2/4 -> 1.0, anything else falls back
    /// to 0.5. Deliberately independent of the source's detected tempo.
    pub fn beat_duration(&self) -> f64 {
        match (self.numerator, self.denominator) {
            (4, 4) => 0.5,
            (3, 4) => 0.66,
            (2, 4) => 1.0,
            _ => 0.5,
        }
    }

    /// Seconds per measure at the fixed beat duration
    pub fn measure_length(&self) -> f64 {
        self.numerator as f64 * self.beat_duration()
    }
}

/// One measure: exactly `numerator` equal-duration slots, each a chord or rest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub slots: Vec<Chord>,
}

impl Measure {
    /// Tile one chord across every slot of the measure
    pub fn from_chord(chord: Chord, time_signature: &TimeSignature) -> Self {
        Measure {
            slots: vec![chord; time_signature.numerator as usize],
        }
    }
}

/// Measures needed to cover `duration` seconds at the fixed measure length
pub fn measures_needed(duration: f64, time_signature: &TimeSignature) -> usize {
    (duration / time_signature.measure_length()).ceil() as usize
}

/// Progression repeats needed so that generated coverage >= source duration
pub fn repeats_needed(
    duration: f64,
    time_signature: &TimeSignature,
    progression_len: usize,
) -> usize {
    let needed = measures_needed(duration, time_signature);
    (needed as f64 / progression_len as f64).ceil() as usize
}

/// Tile a chord progression into measures, repeated consecutively.
///
/// Produces `repeats` x `progression.len()` measures in progression
/// order; each measure holds one chord across all of its slots.
pub fn build_measures(
    progression: &[Chord],
    time_signature: &TimeSignature,
    repeats: usize,
) -> Vec<Measure> {
    let mut measures = Vec::with_capacity(repeats * progression.len());
    for _ in 0..repeats {
        for &chord in progression {
            measures.push(Measure::from_chord(chord, time_signature));
        }
    }
    measures
}
