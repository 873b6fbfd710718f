//! Clue block: section markers and `<n>. <text> ~ <answer>` lines.

use std::collections::HashSet;

use crate::domain::Direction;

use super::{FormatError, FormatErrorKind, Line};

/// Separator between clue text and its inline answer.
pub const ANSWER_SEPARATOR: char = '~';

/// A clue line as written, before reconciliation with the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClueLine {
    pub number: u32,
    pub direction: Direction,
    pub text: String,
    pub answer: Option<String>,
    pub line: usize,
}

pub(crate) fn parse_clue_block(lines: &[Line<'_>]) -> Result<Vec<ClueLine>, FormatError> {
    let mut section: Option<Direction> = None;
    let mut seen: HashSet<(Direction, u32)> = HashSet::new();
    let mut clues = Vec::new();

    for line in lines {
        if let Some(direction) = section_marker(line.text) {
            section = Some(direction);
            continue;
        }

        let clue = parse_clue_line(line, section)?;
        if !seen.insert((clue.direction, clue.number)) {
            return Err(FormatError::new(
                FormatErrorKind::DuplicateClueNumber {
                    number: clue.number,
                    direction: clue.direction,
                },
                line.number,
            ));
        }
        clues.push(clue);
    }

    Ok(clues)
}

/// `Across`, `Down`, optionally with a trailing colon.
fn section_marker(text: &str) -> Option<Direction> {
    match text.trim().trim_end_matches(':').trim().to_ascii_lowercase().as_str() {
        "across" => Some(Direction::Across),
        "down" => Some(Direction::Down),
        _ => None,
    }
}

fn parse_clue_line(line: &Line<'_>, section: Option<Direction>) -> Result<ClueLine, FormatError> {
    let err = |kind| FormatError::new(kind, line.number);

    let (head, rest) = line
        .text
        .trim()
        .split_once('.')
        .ok_or_else(|| err(FormatErrorKind::MalformedClue))?;
    let head = head.trim();

    let (prefix, digits) = match head.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => (Some(c), &head[1..]),
        Some(_) => (None, head),
        None => return Err(err(FormatErrorKind::MalformedClue)),
    };
    let direction = match prefix.map(|c| c.to_ascii_uppercase()) {
        Some('A') => Direction::Across,
        Some('D') => Direction::Down,
        Some(_) => return Err(err(FormatErrorKind::MalformedClue)),
        None => section.ok_or_else(|| err(FormatErrorKind::MissingDirection))?,
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(err(FormatErrorKind::MalformedClue));
    }
    let number: u32 = digits
        .parse()
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| err(FormatErrorKind::InvalidClueNumber))?;

    let (text, answer) = match rest.rsplit_once(ANSWER_SEPARATOR) {
        Some((text, answer)) => (text, Some(answer.trim()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };

    Ok(ClueLine {
        number,
        direction,
        text: text.trim().to_string(),
        answer: answer.map(str::to_string),
        line: line.number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(texts: &[&'static str]) -> Vec<Line<'static>> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Line {
                number: i + 10,
                text: t,
            })
            .collect()
    }

    #[test]
    fn prefixed_lines_carry_their_own_direction() {
        let clues =
            parse_clue_block(&lines(&["A1. First across ~ ABC", "D2. Second down ~ BEH"])).unwrap();
        assert_eq!(clues.len(), 2);
        assert_eq!(clues[0].direction, Direction::Across);
        assert_eq!(clues[0].text, "First across");
        assert_eq!(clues[0].answer.as_deref(), Some("ABC"));
        assert_eq!(clues[1].direction, Direction::Down);
        assert_eq!(clues[1].number, 2);
        assert_eq!(clues[1].line, 11);
    }

    #[test]
    fn section_markers_set_direction() {
        let clues = parse_clue_block(&lines(&[
            "Across",
            "1. Feline ~ CAT",
            "Down:",
            "1. Automobile ~ CAR",
        ]))
        .unwrap();
        assert_eq!(clues[0].direction, Direction::Across);
        assert_eq!(clues[1].direction, Direction::Down);
        assert_eq!(clues[1].number, 1);
    }

    #[test]
    fn answer_is_optional() {
        let clues = parse_clue_block(&lines(&["Across", "1. No answer here"])).unwrap();
        assert_eq!(clues[0].answer, None);
        assert_eq!(clues[0].text, "No answer here");
    }

    #[test]
    fn clue_text_may_contain_periods_and_tildes() {
        let clues = parse_clue_block(&lines(&["A3. St. ~ abbr. ~ STE"])).unwrap();
        assert_eq!(clues[0].text, "St. ~ abbr.");
        assert_eq!(clues[0].answer.as_deref(), Some("STE"));
    }

    #[test]
    fn unprefixed_clue_outside_a_section_fails() {
        let err = parse_clue_block(&lines(&["1. Orphan ~ X"])).unwrap_err();
        assert_eq!(err.kind, FormatErrorKind::MissingDirection);
        assert_eq!(err.line, 10);
    }

    #[test]
    fn duplicate_number_within_direction_fails() {
        let err =
            parse_clue_block(&lines(&["A1. One ~ AB", "D1. Down one ~ AC", "A1. Again ~ AB"]))
                .unwrap_err();
        assert_eq!(
            err.kind,
            FormatErrorKind::DuplicateClueNumber {
                number: 1,
                direction: Direction::Across
            }
        );
        assert_eq!(err.line, 12);
    }

    #[test]
    fn zero_and_garbage_numbers_fail() {
        let err = parse_clue_block(&lines(&["A0. Zero ~ X"])).unwrap_err();
        assert_eq!(err.kind, FormatErrorKind::InvalidClueNumber);
        let err = parse_clue_block(&lines(&["Across", "x1y. Bad ~ X"])).unwrap_err();
        assert_eq!(err.kind, FormatErrorKind::MalformedClue);
        let err = parse_clue_block(&lines(&["no period at all"])).unwrap_err();
        assert_eq!(err.kind, FormatErrorKind::MalformedClue);
    }
}
