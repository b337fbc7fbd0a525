// MIDI Boundary - Source analysis and output merging via midly
// Everything tick-based lives here; the rest of the crate works in
// absolute seconds

pub mod merge;
pub mod source;

pub use merge::merge_chord_track;
pub use source::{
    KeySignatureEvent, MidiError, SourceInstrument, SourceMidi, SourceNote, TempoMap,
};
