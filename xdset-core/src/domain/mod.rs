//! Domain types: puzzles, clues, grid sizes, file identity.

pub mod clue;
pub mod key;
pub mod puzzle;

pub use clue::{answer_len, Clue, ClueWarning, Direction};
pub use key::FileKey;
pub use puzzle::{grid_hash, identity_key, weekday_name, GridSize, Puzzle, PuzzleWarning};
