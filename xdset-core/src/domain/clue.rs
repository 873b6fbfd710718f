//! Clue records and the per-clue quality warnings attached during parsing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a grid entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Across,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Across, Direction::Down];

    /// Single-letter prefix used by direction-tagged clue lines (`A1.`, `D12.`).
    pub fn prefix(self) -> char {
        match self {
            Direction::Across => 'A',
            Direction::Down => 'D',
        }
    }

    /// Row/column step for walking a run in this direction.
    pub fn step(self) -> (usize, usize) {
        match self {
            Direction::Across => (0, 1),
            Direction::Down => (1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Across => write!(f, "across"),
            Direction::Down => write!(f, "down"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "across" | "a" => Ok(Direction::Across),
            "down" | "d" => Ok(Direction::Down),
            other => Err(format!("invalid direction: {other}")),
        }
    }
}

/// Quality warning attached to a single clue.
///
/// Warnings never reject a puzzle; they record where the clue block and the
/// grid disagree so both views survive into the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClueWarning {
    /// The grid numbers this clue's ordinal slot differently.
    NumberMismatch { grid_number: u32 },
    /// No entry in the grid starts at this number in this direction.
    NotInGrid,
    /// Answer length differs from the traced run length.
    LengthMismatch { expected: usize, found: usize },
    /// Same length, different letters than the grid.
    AnswerMismatch { grid: String },
    /// The clue line had no inline answer; it was read off the grid.
    AnswerFromGrid,
}

/// One clue as it appeared in the clue block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clue {
    pub number: u32,
    pub direction: Direction,
    #[serde(default)]
    pub clue: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ClueWarning>,
}

impl Clue {
    pub fn new(
        number: u32,
        direction: Direction,
        clue: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            number,
            direction,
            clue: clue.into(),
            answer: answer.into(),
            warnings: Vec::new(),
        }
    }

    /// Answer length with whitespace excluded.
    pub fn answer_len(&self) -> usize {
        answer_len(&self.answer)
    }

    /// Whitespace-separated word count of the clue text.
    pub fn word_count(&self) -> usize {
        self.clue.split_whitespace().count()
    }
}

/// Letter count of an answer, ignoring whitespace.
pub fn answer_len(answer: &str) -> usize {
    answer.chars().filter(|c| !c.is_whitespace()).count()
}
