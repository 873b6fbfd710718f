//! The puzzle record: one line of the output dataset.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::clue::{Clue, Direction};
use super::key::FileKey;

/// Grid dimensions, persisted as `"{width}x{height}"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GridSize {
    pub width: usize,
    pub height: usize,
}

impl GridSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for GridSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("size must be WxH, got '{s}'"))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| format!("invalid width in size '{s}'"))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| format!("invalid height in size '{s}'"))?;
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for GridSize {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<GridSize> for String {
    fn from(size: GridSize) -> Self {
        size.to_string()
    }
}

/// Puzzle-level quality warning recorded by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PuzzleWarning {
    /// Metadata declared a size that disagrees with the grid.
    SizeMismatch { declared: String, derived: String },
    /// A `Date` value none of the accepted formats could read.
    UnparsedDate { raw: String },
    /// A recognized metadata key appeared more than once; the last value won.
    DuplicateMetadataKey { key: String },
    /// The grid numbers an entry that no clue refers to.
    UncluedEntry { number: u32, direction: Direction },
}

/// A parsed puzzle. Created once per successfully parsed file, never mutated
/// after it is appended to the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    #[serde(default)]
    pub key: FileKey,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_file: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub day: String,
    pub size: GridSize,
    pub grid: Vec<String>,
    pub clues: Vec<Clue>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub editor: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub copyright: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PuzzleWarning>,
}

impl Puzzle {
    /// Corpus-wide identity: provenance tag plus file key.
    pub fn identity_key(&self) -> String {
        identity_key(&self.source, self.key.as_str())
    }

    /// Content hash over the grid rows.
    pub fn grid_hash(&self) -> blake3::Hash {
        grid_hash(&self.grid)
    }

    pub fn year(&self) -> Option<i32> {
        self.date.map(|d| d.year())
    }

    pub fn has_theme(&self) -> bool {
        !self.theme.trim().is_empty()
    }

    /// Mean answer length over clues that have an answer, 0.0 when none do.
    pub fn avg_answer_length(&self) -> f64 {
        let lengths: Vec<usize> = self
            .clues
            .iter()
            .map(|c| c.answer_len())
            .filter(|&n| n > 0)
            .collect();
        if lengths.is_empty() {
            return 0.0;
        }
        lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
    }

    pub fn clues_in(&self, direction: Direction) -> impl Iterator<Item = &Clue> {
        self.clues.iter().filter(move |c| c.direction == direction)
    }
}

/// `source:key`, the composite key the validator deduplicates on.
pub fn identity_key(source: &str, key: &str) -> String {
    format!("{source}:{key}")
}

/// blake3 over the rows, newline-joined.
pub fn grid_hash(rows: &[String]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    for row in rows {
        hasher.update(row.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize()
}

/// English weekday name for a date.
pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
