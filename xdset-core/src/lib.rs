//! xdset core: puzzle domain types, grid numbering, and the `.xd` parser.
//!
//! This crate is pure: no filesystem walking, no ledger, no threads.
//! - Domain types (puzzles, clues, grid sizes, file keys)
//! - Standard crossword numbering over a grid
//! - Text format parser producing one `Puzzle` per file

pub mod domain;
pub mod grid;
pub mod parser;

pub use domain::{Clue, Direction, FileKey, GridSize, Puzzle};
pub use parser::{parse_puzzle, FormatError, FormatErrorKind};
