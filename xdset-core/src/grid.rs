//! Grid geometry: standard crossword numbering and run tracing.
//!
//! A cell starts an across entry when it is open, the cell to its left is a
//! block or the edge, and the cell to its right is open. Down entries follow
//! the same rule vertically. Numbers are assigned in row-major order, one
//! number per starting cell shared by both directions.

use crate::domain::{Direction, GridSize};

/// Character marking a filled (black) cell.
pub const BLOCK: char = '#';

/// A numbered entry in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub number: u32,
    pub direction: Direction,
    pub row: usize,
    pub col: usize,
    pub length: usize,
}

/// Rectangular view over grid rows. Short rows are padded with blocks.
#[derive(Debug, Clone)]
pub struct Grid {
    cells: Vec<Vec<char>>,
    width: usize,
}

impl Grid {
    pub fn new<S: AsRef<str>>(rows: &[S]) -> Self {
        let cells: Vec<Vec<char>> = rows.iter().map(|r| r.as_ref().chars().collect()).collect();
        let width = cells.iter().map(Vec::len).max().unwrap_or(0);
        Self { cells, width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.cells.len()
    }

    pub fn size(&self) -> GridSize {
        GridSize::new(self.width, self.height())
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<char> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn is_open(&self, row: usize, col: usize) -> bool {
        matches!(self.cell(row, col), Some(c) if c != BLOCK)
    }

    /// All entries, across and down, ordered by number then direction.
    pub fn entries(&self) -> Vec<Entry> {
        let mut out = Vec::new();
        let mut next = 1u32;
        for row in 0..self.height() {
            for col in 0..self.width {
                if !self.is_open(row, col) {
                    continue;
                }
                let across = (col == 0 || !self.is_open(row, col - 1)) && self.is_open(row, col + 1);
                let down = (row == 0 || !self.is_open(row - 1, col)) && self.is_open(row + 1, col);
                if !(across || down) {
                    continue;
                }
                for (starts, direction) in [(across, Direction::Across), (down, Direction::Down)] {
                    if starts {
                        out.push(Entry {
                            number: next,
                            direction,
                            row,
                            col,
                            length: self.run_length(row, col, direction),
                        });
                    }
                }
                next += 1;
            }
        }
        out
    }

    fn run_length(&self, row: usize, col: usize, direction: Direction) -> usize {
        let (dr, dc) = direction.step();
        let (mut r, mut c, mut n) = (row, col, 0);
        while self.is_open(r, c) {
            n += 1;
            r += dr;
            c += dc;
        }
        n
    }

    /// The characters of an entry's run, as they appear in the grid.
    pub fn run_text(&self, entry: &Entry) -> String {
        let (dr, dc) = entry.direction.step();
        (0..entry.length)
            .filter_map(|i| self.cell(entry.row + i * dr, entry.col + i * dc))
            .collect()
    }
}

/// Entry lookup by number, per direction.
#[derive(Debug, Clone, Default)]
pub struct Numbering {
    across: Vec<Entry>,
    down: Vec<Entry>,
}

impl Numbering {
    pub fn of(grid: &Grid) -> Self {
        let mut numbering = Self::default();
        for entry in grid.entries() {
            match entry.direction {
                Direction::Across => numbering.across.push(entry),
                Direction::Down => numbering.down.push(entry),
            }
        }
        numbering
    }

    pub fn entries(&self, direction: Direction) -> &[Entry] {
        match direction {
            Direction::Across => &self.across,
            Direction::Down => &self.down,
        }
    }

    pub fn find(&self, number: u32, direction: Direction) -> Option<&Entry> {
        let entries = self.entries(direction);
        entries
            .binary_search_by_key(&number, |e| e.number)
            .ok()
            .map(|i| &entries[i])
    }
}

/// True when every character of a run is a letter (no blanks or blocks).
pub fn is_fully_lettered(run: &str) -> bool {
    !run.is_empty() && run.chars().all(char::is_alphabetic)
}
