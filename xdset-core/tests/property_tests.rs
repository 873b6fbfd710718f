//! Property tests for parser invariants.
//!
//! 1. Record round-trip: JSON line → Puzzle → JSON line is lossless
//! 2. Grid shape: every parsed grid is rectangular and matches `size`
//! 3. Ragged grids never produce a record

use proptest::prelude::*;
use xdset_core::domain::{Direction, Puzzle};
use xdset_core::grid::{Grid, Numbering};
use xdset_core::parser::{parse_puzzle, FormatErrorKind};

// ── Strategies (proptest) ────────────────────────────────────────────

/// Rectangular grid of letters with roughly one block in five.
fn arb_grid() -> impl Strategy<Value = Vec<String>> {
    (2usize..8, 2usize..8).prop_flat_map(|(w, h)| {
        prop::collection::vec(
            prop::collection::vec(prop_oneof![4 => prop::char::range('A', 'Z'), 1 => Just('#')], w)
                .prop_map(|cells| cells.into_iter().collect::<String>()),
            h,
        )
    })
}

fn arb_title() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ,']{0,30}".prop_map(|s| s.trim().to_string())
}

/// Render a grid with clues for every numbered entry, answers traced from the grid.
fn render(title: &str, rows: &[String]) -> String {
    let grid = Grid::new(rows);
    let numbering = Numbering::of(&grid);
    let mut out = format!("Title: {title}\nAuthor: Prop Test\nDate: 2021-03-04\n\n");
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    out.push('\n');
    for direction in Direction::ALL {
        out.push_str(&format!("{}\n", if direction == Direction::Across { "Across" } else { "Down" }));
        for entry in numbering.entries(direction) {
            let answer = grid.run_text(entry);
            out.push_str(&format!("{}. Clue for {answer} ~ {answer}\n", entry.number));
        }
        out.push('\n');
    }
    out
}

fn has_entries(rows: &[String]) -> bool {
    !Grid::new(rows).entries().is_empty()
}

// ── 1. Round-trip ────────────────────────────────────────────────────

proptest! {
    /// Serializing a parsed record and reading the line back is lossless.
    #[test]
    fn record_round_trips_through_json(title in arb_title(), rows in arb_grid()) {
        prop_assume!(has_entries(&rows));
        let mut puzzle = parse_puzzle(&render(&title, &rows)).unwrap();
        puzzle.source = "xd".into();
        puzzle.key = "prop/test.xd".into();

        let line = serde_json::to_string(&puzzle).unwrap();
        prop_assert!(!line.contains('\n'));
        let back: Puzzle = serde_json::from_str(&line).unwrap();
        prop_assert_eq!(&back, &puzzle);
        prop_assert_eq!(serde_json::to_string(&back).unwrap(), line);
    }

    /// Rendering grid-traced answers yields a warning-free record.
    #[test]
    fn traced_answers_reconcile_cleanly(rows in arb_grid()) {
        prop_assume!(has_entries(&rows));
        let puzzle = parse_puzzle(&render("T", &rows)).unwrap();
        for clue in &puzzle.clues {
            prop_assert!(clue.warnings.is_empty(), "{:?}", clue);
        }
        prop_assert!(puzzle.warnings.is_empty(), "{:?}", puzzle.warnings);
    }
}

// ── 2. Grid shape ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn parsed_grid_is_rectangular(rows in arb_grid()) {
        prop_assume!(has_entries(&rows));
        let puzzle = parse_puzzle(&render("T", &rows)).unwrap();
        prop_assert_eq!(puzzle.grid.len(), puzzle.size.height);
        for row in &puzzle.grid {
            prop_assert_eq!(row.chars().count(), puzzle.size.width);
        }
    }

    // ── 3. Ragged grids ──────────────────────────────────────────────

    #[test]
    fn ragged_row_is_rejected(rows in arb_grid(), victim in any::<prop::sample::Index>()) {
        prop_assume!(rows.len() >= 3);
        let mut rows = rows;
        let i = victim.index(rows.len());
        rows[i].push('Q');
        let content = format!("Title: T\n\n{}\n\nA1. x ~ AB\n", rows.join("\n"));

        let err = parse_puzzle(&content).unwrap_err();
        prop_assert!(
            matches!(err.kind, FormatErrorKind::InconsistentRowWidth { .. }),
            "{:?}",
            err
        );
        // Title is line 1, blank line 2, grid starts on line 3.
        prop_assert_eq!(err.line, i + 3);
    }
}
