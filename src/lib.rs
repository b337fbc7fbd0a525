// Chordweave - Diatonic chord accompaniment for MIDI performances
// Module declarations

pub mod midi;
pub mod pipeline;
pub mod score;
pub mod theory;
pub mod track;
