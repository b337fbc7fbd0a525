// Score Layout - Time signatures, measures, and coverage math
// Tiles expanded chord progressions across the source's duration

pub mod measure;

pub use measure::{
    Measure, ScoreError, TimeSignature, build_measures, measures_needed, repeats_needed,
};
