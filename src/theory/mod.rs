// Music Theory - Keys, modes, degrees, and chord construction
// Expands scale-degree progressions into concrete pitch material

pub mod key;
pub mod progression;

pub use key::{Accidental, Key, Letter, Mode, NoteName, TheoryError};
pub use progression::{Chord, expand_progression, parse_progression};
