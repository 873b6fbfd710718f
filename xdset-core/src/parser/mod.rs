//! Parser for the `.xd` puzzle text format.
//!
//! A file is three blank-line-delimited blocks, in order:
//!
//! 1. metadata: `Key: value` lines (optional block)
//! 2. grid: one row per line, `#` for a block
//! 3. clues: `Across`/`Down` sections of `<n>. <text> ~ <answer>` lines,
//!    or direction-prefixed `A<n>.` / `D<n>.` lines; blank lines inside
//!    the clue region only separate groups
//!
//! Lines starting with `//` are comments and are skipped anywhere.
//!
//! Structural problems are a [`FormatError`] carrying the offending line.
//! Disagreements between the clue block and the grid are recorded as
//! warnings on the record instead.

pub mod clues;
pub mod metadata;

use std::collections::HashSet;
use std::path::Path;

use thiserror::Error;

use crate::domain::{answer_len, weekday_name, Clue, ClueWarning, Direction, GridSize, Puzzle, PuzzleWarning};
use crate::grid::{is_fully_lettered, Grid, Numbering};

pub use clues::ClueLine;
pub use metadata::{looks_like_metadata, parse_date, Metadata, MetadataKey};

/// Leading marker of a comment line.
pub const COMMENT_MARKER: &str = "//";

/// Why a file was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatErrorKind {
    #[error("empty input")]
    EmptyInput,
    #[error("malformed metadata line")]
    MalformedMetadata,
    #[error("missing grid block")]
    MissingGrid,
    #[error("malformed grid row")]
    MalformedGridRow,
    #[error("inconsistent row width: expected {expected}, found {found}")]
    InconsistentRowWidth { expected: usize, found: usize },
    #[error("missing clue block")]
    MissingClues,
    #[error("malformed clue line")]
    MalformedClue,
    #[error("clue without direction")]
    MissingDirection,
    #[error("invalid clue number")]
    InvalidClueNumber,
    #[error("duplicate clue number {number} {direction}")]
    DuplicateClueNumber { number: u32, direction: Direction },
}

/// A file-level parse failure. Never fatal to a run: one per malformed file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (line {line})")]
pub struct FormatError {
    pub kind: FormatErrorKind,
    /// 1-based physical line number.
    pub line: usize,
}

impl FormatError {
    pub fn new(kind: FormatErrorKind, line: usize) -> Self {
        Self { kind, line }
    }
}

/// A physical line with its 1-based number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Line<'a> {
    pub number: usize,
    pub text: &'a str,
}

/// Split content into blank-line-delimited blocks, dropping comments.
fn split_blocks(content: &str) -> (Vec<Vec<Line<'_>>>, usize) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut blocks = Vec::new();
    let mut current: Vec<Line<'_>> = Vec::new();
    let mut total = 0;

    for (i, raw) in content.lines().enumerate() {
        total = i + 1;
        let text = raw.trim_end();
        if text.trim_start().starts_with(COMMENT_MARKER) {
            continue;
        }
        if text.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(Line { number: i + 1, text });
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    (blocks, total)
}

/// Parse one file's content into a [`Puzzle`].
///
/// Provenance fields (`key`, `source`, `source_file`) are left empty; the
/// caller that knows where the content came from fills them in.
pub fn parse_puzzle(content: &str) -> Result<Puzzle, FormatError> {
    let (blocks, total_lines) = split_blocks(content);
    let eof_line = total_lines.max(1);
    let mut blocks = blocks.into_iter().peekable();

    let first = blocks
        .peek()
        .ok_or(FormatError::new(FormatErrorKind::EmptyInput, eof_line))?;
    let meta = if looks_like_metadata(first[0].text) {
        let block = blocks.next().unwrap_or_default();
        Metadata::parse(&block)?
    } else {
        Metadata::default()
    };

    let grid_block = blocks
        .next()
        .ok_or(FormatError::new(FormatErrorKind::MissingGrid, eof_line))?;
    let rows = parse_grid(&grid_block)?;

    let clue_lines: Vec<Line<'_>> = blocks.flatten().collect();
    let parsed = clues::parse_clue_block(&clue_lines)?;
    if parsed.is_empty() {
        return Err(FormatError::new(FormatErrorKind::MissingClues, eof_line));
    }

    Ok(assemble(meta, rows, parsed))
}

/// Read and parse a file from disk.
pub fn parse_file(path: &Path) -> Result<Puzzle, ParseFileError> {
    let bytes = std::fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    Ok(parse_puzzle(&content)?)
}

/// Failure to produce a record from a file on disk.
#[derive(Debug, Error)]
pub enum ParseFileError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("format error: {0}")]
    Format(#[from] FormatError),
}

fn parse_grid(block: &[Line<'_>]) -> Result<Vec<String>, FormatError> {
    let mut rows = Vec::with_capacity(block.len());
    for line in block {
        let row = line.text.trim();
        if row.chars().any(char::is_whitespace) {
            return Err(FormatError::new(FormatErrorKind::MalformedGridRow, line.number));
        }
        rows.push(row.to_string());
    }

    let expected = reference_width(&rows);
    if let Some((line, row)) = block.iter().zip(&rows).find(|(_, r)| r.chars().count() != expected) {
        return Err(FormatError::new(
            FormatErrorKind::InconsistentRowWidth {
                expected,
                found: row.chars().count(),
            },
            line.number,
        ));
    }
    Ok(rows)
}

/// Most common row length; ties go to the wider one.
fn reference_width(rows: &[String]) -> usize {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for row in rows {
        let len = row.chars().count();
        match counts.iter_mut().find(|(l, _)| *l == len) {
            Some((_, n)) => *n += 1,
            None => counts.push((len, 1)),
        }
    }
    counts
        .into_iter()
        .max_by_key(|&(len, n)| (n, len))
        .map(|(len, _)| len)
        .unwrap_or(0)
}

fn assemble(meta: Metadata, rows: Vec<String>, parsed: Vec<ClueLine>) -> Puzzle {
    let grid = Grid::new(&rows);
    let size = grid.size();
    let mut warnings = Vec::new();

    for key in &meta.repeated_keys {
        warnings.push(PuzzleWarning::DuplicateMetadataKey { key: key.clone() });
    }

    if let Some(declared) = meta.size.as_deref() {
        if declared.parse::<GridSize>().ok() != Some(size) {
            warnings.push(PuzzleWarning::SizeMismatch {
                declared: declared.to_string(),
                derived: size.to_string(),
            });
        }
    }

    let raw_date = meta.date.clone().unwrap_or_default();
    let date = parse_date(&raw_date);
    if date.is_none() && !raw_date.is_empty() {
        warnings.push(PuzzleWarning::UnparsedDate { raw: raw_date });
    }

    let (clues, unclued) = reconcile(&grid, parsed);
    warnings.extend(unclued);

    Puzzle {
        key: Default::default(),
        source: String::new(),
        source_file: String::new(),
        date,
        day: date.map(weekday_name).unwrap_or_default().to_string(),
        size,
        grid: rows,
        clues,
        title: meta.title.unwrap_or_default(),
        theme: meta.theme.unwrap_or_default(),
        author: meta.author.unwrap_or_default(),
        editor: meta.editor.unwrap_or_default(),
        publisher: meta.publisher.unwrap_or_default(),
        copyright: meta.copyright.unwrap_or_default(),
        ignored_keys: meta.ignored_keys.into_iter().collect(),
        warnings,
    }
}

/// Cross-check clue lines against grid-derived numbering.
///
/// The clue-block number is kept on every clue. A number the grid has no
/// entry for gets `NotInGrid`, plus the number of the grid entry at the same
/// position when there is one. Grid entries that no clue names are
/// returned as puzzle-level warnings.
fn reconcile(grid: &Grid, parsed: Vec<ClueLine>) -> (Vec<Clue>, Vec<PuzzleWarning>) {
    let numbering = Numbering::of(grid);
    let mut ordinal = [0usize; 2];
    let mut named: HashSet<(Direction, u32)> = HashSet::new();

    let clues = parsed
        .into_iter()
        .map(|line| {
            let slot = &mut ordinal[line.direction as usize];
            let position = *slot;
            *slot += 1;
            named.insert((line.direction, line.number));

            let mut warnings = Vec::new();
            let mut answer = line.answer.unwrap_or_default();
            match numbering.find(line.number, line.direction) {
                None => {
                    // The entry at the same position is the grid's best guess.
                    if let Some(expected) = numbering.entries(line.direction).get(position) {
                        warnings.push(ClueWarning::NumberMismatch {
                            grid_number: expected.number,
                        });
                    }
                    warnings.push(ClueWarning::NotInGrid);
                }
                Some(entry) => {
                    let run = grid.run_text(entry);
                    if answer.is_empty() {
                        if is_fully_lettered(&run) {
                            answer = run.to_uppercase();
                            warnings.push(ClueWarning::AnswerFromGrid);
                        }
                    } else if answer_len(&answer) != entry.length {
                        warnings.push(ClueWarning::LengthMismatch {
                            expected: entry.length,
                            found: answer_len(&answer),
                        });
                    } else if is_fully_lettered(&run) && !same_letters(&run, &answer) {
                        warnings.push(ClueWarning::AnswerMismatch { grid: run });
                    }
                }
            }

            Clue {
                number: line.number,
                direction: line.direction,
                clue: line.text,
                answer,
                warnings,
            }
        })
        .collect();

    let unclued = Direction::ALL
        .iter()
        .flat_map(|&d| numbering.entries(d).iter())
        .filter(|e| !named.contains(&(e.direction, e.number)))
        .map(|e| PuzzleWarning::UncluedEntry {
            number: e.number,
            direction: e.direction,
        })
        .collect();

    (clues, unclued)
}

fn same_letters(run: &str, answer: &str) -> bool {
    let answer = answer.chars().filter(|c| !c.is_whitespace());
    run.chars()
        .map(|c| c.to_ascii_uppercase())
        .eq(answer.map(|c| c.to_ascii_uppercase()))
}
