// Chord Track - Note model, synthesis, and refinement stages
// A single owned track is threaded mutably through the stages in order

pub mod model;
pub mod refine;
pub mod synth;

pub use model::{ChordTrack, Note, NoteKind};
pub use refine::{
    GROUP_TOLERANCE, fix_durations, group_notes, mark_placeholders, normalize_volume,
    strip_placeholders, transpose,
};
pub use synth::synthesize_track;
