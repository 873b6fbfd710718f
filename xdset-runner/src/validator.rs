//! Streaming validation of a built dataset.
//!
//! One pass over the JSONL file. Each line is first checked as raw JSON for
//! required fields and well-formed values, then decoded into a [`Puzzle`]
//! for structural and cross-record checks. Memory held across records is the
//! set of identity keys, `(source, date)` pairs and grid hashes seen so far.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use xdset_core::domain::{answer_len, Direction, GridSize, Puzzle};
use xdset_core::grid::{Grid, Numbering};

use crate::fsio;
use crate::reporter::Reporter;
use crate::store::{RawLine, RecordReader};

/// Fields every record must carry.
pub const REQUIRED_FIELDS: [&str; 4] = ["key", "size", "grid", "clues"];
/// Fields every clue must carry.
pub const REQUIRED_CLUE_FIELDS: [&str; 4] = ["number", "direction", "clue", "answer"];
/// Fields whose absence is counted but not reported per record.
pub const RECOMMENDED_FIELDS: [&str; 4] = ["date", "day", "author", "source"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    // ── Errors ──
    MalformedJson,
    TruncatedRecord,
    MissingField,
    DuplicateKey,
    GridShape,
    InvalidSize,
    InvalidDirection,
    NumberingOrder,
    // ── Warnings ──
    DuplicateSourceDate,
    DuplicateGrid,
    EmptyClue,
    EmptyAnswer,
    UnusualAnswerChars,
    AnswerLengthMismatch,
    NotInGrid,
}

impl ViolationKind {
    pub fn severity(self) -> Severity {
        use ViolationKind::*;
        match self {
            MalformedJson | TruncatedRecord | MissingField | DuplicateKey | GridShape
            | InvalidSize | InvalidDirection | NumberingOrder => Severity::Error,
            DuplicateSourceDate | DuplicateGrid | EmptyClue | EmptyAnswer | UnusualAnswerChars
            | AnswerLengthMismatch | NotInGrid => Severity::Warning,
        }
    }

    pub fn as_str(self) -> &'static str {
        use ViolationKind::*;
        match self {
            MalformedJson => "malformed_json",
            TruncatedRecord => "truncated_record",
            MissingField => "missing_field",
            DuplicateKey => "duplicate_key",
            GridShape => "grid_shape",
            InvalidSize => "invalid_size",
            InvalidDirection => "invalid_direction",
            NumberingOrder => "numbering_order",
            DuplicateSourceDate => "duplicate_source_date",
            DuplicateGrid => "duplicate_grid",
            EmptyClue => "empty_clue",
            EmptyAnswer => "empty_answer",
            UnusualAnswerChars => "unusual_answer_chars",
            AnswerLengthMismatch => "answer_length_mismatch",
            NotInGrid => "not_in_grid",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding, tied to a dataset line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// 1-based line in the dataset.
    pub line: usize,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub total_records: usize,
    /// Records with no error-severity violation.
    pub valid_records: usize,
    pub violations: Vec<Violation>,
    pub counts: BTreeMap<ViolationKind, usize>,
    pub missing_recommended: BTreeMap<String, usize>,
}

impl ValidationReport {
    pub fn error_count(&self) -> usize {
        self.count_severity(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count_severity(Severity::Warning)
    }

    fn count_severity(&self, severity: Severity) -> usize {
        self.counts
            .iter()
            .filter(|(k, _)| k.severity() == severity)
            .map(|(_, n)| n)
            .sum()
    }

    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }

    pub fn count(&self, kind: ViolationKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }

    /// Pretty JSON, replaced atomically.
    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fsio::write_atomic(path, &bytes)
    }
}

/// Streaming validator. Feed lines in file order, then [`Validator::finish`].
pub struct Validator<'a> {
    reporter: &'a dyn Reporter,
    report: ValidationReport,
    seen_keys: HashSet<String>,
    seen_source_dates: HashSet<(String, NaiveDate)>,
    seen_grids: HashSet<blake3::Hash>,
    // Scratch for the record being checked.
    line: usize,
    key: Option<String>,
    record_errors: usize,
}

impl<'a> Validator<'a> {
    pub fn new(reporter: &'a dyn Reporter) -> Self {
        Self {
            reporter,
            report: ValidationReport::default(),
            seen_keys: HashSet::new(),
            seen_source_dates: HashSet::new(),
            seen_grids: HashSet::new(),
            line: 0,
            key: None,
            record_errors: 0,
        }
    }

    pub fn check(&mut self, raw: &RawLine) {
        self.report.total_records += 1;
        self.line = raw.number;
        self.key = None;
        self.record_errors = 0;

        let value: Value = match serde_json::from_str(&raw.text) {
            Ok(v) => v,
            Err(e) if raw.unterminated => {
                return self.push(ViolationKind::TruncatedRecord, format!("unterminated last line: {e}"))
            }
            Err(e) => return self.push(ViolationKind::MalformedJson, format!("invalid JSON: {e}")),
        };
        let Some(obj) = value.as_object() else {
            return self.push(ViolationKind::MalformedJson, "record is not a JSON object".into());
        };
        self.key = obj.get("key").and_then(Value::as_str).map(str::to_string);

        if !self.check_fields(obj) {
            self.finish_record();
            return;
        }

        match serde_json::from_value::<Puzzle>(value) {
            Ok(puzzle) => self.check_puzzle(&puzzle),
            Err(e) if self.record_errors == 0 => {
                self.push(ViolationKind::MalformedJson, format!("record does not match schema: {e}"))
            }
            Err(_) => {}
        }
        self.finish_record();
    }

    /// Raw-JSON checks. Returns whether the record is complete enough to decode.
    fn check_fields(&mut self, obj: &Map<String, Value>) -> bool {
        let mut decodable = true;
        for field in REQUIRED_FIELDS {
            if obj.get(field).map_or(true, Value::is_null) {
                self.push(ViolationKind::MissingField, format!("missing field `{field}`"));
                decodable = false;
            }
        }
        for field in RECOMMENDED_FIELDS {
            let missing = match obj.get(field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            };
            if missing {
                *self.report.missing_recommended.entry(field.to_string()).or_default() += 1;
            }
        }

        if let Some(size) = obj.get("size") {
            let parsed = size.as_str().map(str::parse::<GridSize>);
            if !matches!(parsed, Some(Ok(_))) && !size.is_null() {
                self.push(ViolationKind::InvalidSize, format!("size {size} is not WxH"));
                decodable = false;
            }
        }

        if let Some(clues) = obj.get("clues").and_then(Value::as_array) {
            for (i, clue) in clues.iter().enumerate() {
                let Some(clue) = clue.as_object() else {
                    self.push(ViolationKind::MalformedJson, format!("clue {i} is not an object"));
                    decodable = false;
                    continue;
                };
                for field in REQUIRED_CLUE_FIELDS {
                    if clue.get(field).map_or(true, Value::is_null) {
                        self.push(
                            ViolationKind::MissingField,
                            format!("clue {i}: missing field `{field}`"),
                        );
                        if matches!(field, "number" | "direction") {
                            decodable = false;
                        }
                    }
                }
                if let Some(dir) = clue.get("direction").filter(|d| !d.is_null()) {
                    if !matches!(dir.as_str().map(str::parse::<Direction>), Some(Ok(_))) {
                        self.push(ViolationKind::InvalidDirection, format!("clue {i}: invalid direction {dir}"));
                        decodable = false;
                    }
                }
            }
        }
        decodable
    }

    fn check_puzzle(&mut self, puzzle: &Puzzle) {
        // Corpus-wide identity.
        let identity = puzzle.identity_key();
        if !self.seen_keys.insert(identity.clone()) {
            self.push(ViolationKind::DuplicateKey, format!("duplicate record key {identity}"));
        }
        if let Some(date) = puzzle.date {
            if !self.seen_source_dates.insert((puzzle.source.clone(), date)) {
                self.push(
                    ViolationKind::DuplicateSourceDate,
                    format!("another record from {} on {date}", puzzle.source),
                );
            }
        }
        if !self.seen_grids.insert(puzzle.grid_hash()) {
            self.push(ViolationKind::DuplicateGrid, "grid identical to an earlier record".into());
        }

        // Grid shape against declared size.
        let size = puzzle.size;
        if puzzle.grid.len() != size.height {
            self.push(
                ViolationKind::GridShape,
                format!("size says {} rows, grid has {}", size.height, puzzle.grid.len()),
            );
        }
        if let Some((i, row)) = puzzle
            .grid
            .iter()
            .enumerate()
            .find(|(_, r)| r.chars().count() != size.width)
        {
            self.push(
                ViolationKind::GridShape,
                format!("row {i} has length {}, size says {}", row.chars().count(), size.width),
            );
        }

        // Numbering order and per-clue content.
        let numbering = Numbering::of(&Grid::new(&puzzle.grid));
        let mut last: [Option<u32>; 2] = [None, None];
        for clue in &puzzle.clues {
            let tag = format!("{}{}", clue.direction.prefix(), clue.number);
            let prev = &mut last[clue.direction as usize];
            if prev.is_some_and(|p| clue.number <= p) {
                self.push(
                    ViolationKind::NumberingOrder,
                    format!("{tag} is not after {}{}", clue.direction.prefix(), prev.unwrap_or(0)),
                );
            }
            *prev = Some(clue.number);

            if clue.clue.trim().is_empty() {
                self.push(ViolationKind::EmptyClue, format!("{tag} has no clue text"));
            }
            if clue.answer.trim().is_empty() {
                self.push(ViolationKind::EmptyAnswer, format!("{tag} has no answer"));
            } else if !clue.answer.chars().all(|c| c.is_alphabetic() || c.is_whitespace()) {
                self.push(
                    ViolationKind::UnusualAnswerChars,
                    format!("{tag} answer {:?} has non-letter characters", clue.answer),
                );
            }

            match numbering.find(clue.number, clue.direction) {
                None => self.push(ViolationKind::NotInGrid, format!("{tag} has no grid entry")),
                Some(entry) => {
                    let found = answer_len(&clue.answer);
                    if found > 0 && found != entry.length {
                        self.push(
                            ViolationKind::AnswerLengthMismatch,
                            format!("{tag} answer has {found} letters, grid run has {}", entry.length),
                        );
                    }
                }
            }
        }
    }

    fn push(&mut self, kind: ViolationKind, message: String) {
        let violation = Violation {
            line: self.line,
            kind,
            severity: kind.severity(),
            message,
            key: self.key.clone(),
        };
        if violation.severity == Severity::Error {
            self.record_errors += 1;
        }
        self.reporter.violation(&violation);
        *self.report.counts.entry(kind).or_default() += 1;
        self.report.violations.push(violation);
    }

    fn finish_record(&mut self) {
        if self.record_errors == 0 {
            self.report.valid_records += 1;
        }
    }

    pub fn finish(self) -> ValidationReport {
        self.reporter.validation_finished(&self.report);
        self.report
    }
}

/// Validate a dataset file in one pass.
pub fn validate_file(path: &Path, reporter: &dyn Reporter) -> io::Result<ValidationReport> {
    validate_lines(RecordReader::open(path)?, reporter)
}

pub fn validate_lines(
    lines: impl IntoIterator<Item = io::Result<RawLine>>,
    reporter: &dyn Reporter,
) -> io::Result<ValidationReport> {
    let mut validator = Validator::new(reporter);
    for line in lines {
        validator.check(&line?);
    }
    Ok(validator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;
    use serde_json::json;

    fn record(key: &str) -> Value {
        json!({
            "key": key,
            "source": "xd",
            "date": "2024-01-15",
            "day": "Monday",
            "author": "A",
            "size": "3x3",
            "grid": ["CAT", "APE", "RAT"],
            "clues": [
                {"number": 1, "direction": "across", "clue": "Feline", "answer": "CAT"},
                {"number": 4, "direction": "across", "clue": "Primate", "answer": "APE"},
                {"number": 1, "direction": "down", "clue": "Auto", "answer": "CAR"}
            ]
        })
    }

    fn run(values: &[Value]) -> ValidationReport {
        let mut v = Validator::new(&NullReporter);
        for (i, value) in values.iter().enumerate() {
            v.check(&RawLine {
                number: i + 1,
                text: value.to_string(),
                unterminated: false,
            });
        }
        v.finish()
    }

    #[test]
    fn clean_record_is_valid() {
        let report = run(&[record("a.xd")]);
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.total_records, 1);
        assert_eq!(report.valid_records, 1);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn missing_answer_is_reported_not_dropped() {
        let mut rec = record("a.xd");
        rec["clues"][1].as_object_mut().unwrap().remove("answer");
        let report = run(&[rec]);
        assert_eq!(report.total_records, 1);
        assert!(!report.is_valid());
        let v: Vec<_> = report.of_kind(ViolationKind::MissingField).collect();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].line, 1);
        assert!(v[0].message.contains("`answer`"));
        assert_eq!(v[0].key.as_deref(), Some("a.xd"));
    }

    #[test]
    fn duplicate_identity_is_an_error() {
        let report = run(&[record("a.xd"), record("a.xd")]);
        assert_eq!(report.count(ViolationKind::DuplicateKey), 1);
        assert_eq!(report.valid_records, 1);
        // Same grid and same source/date also show up as warnings.
        assert_eq!(report.count(ViolationKind::DuplicateGrid), 1);
        assert_eq!(report.count(ViolationKind::DuplicateSourceDate), 1);
    }

    #[test]
    fn same_key_from_different_sources_is_distinct() {
        let mut other = record("a.xd");
        other["source"] = json!("other");
        let report = run(&[record("a.xd"), other]);
        assert_eq!(report.count(ViolationKind::DuplicateKey), 0);
    }

    #[test]
    fn grid_and_answer_checks() {
        let mut rec = record("a.xd");
        rec["grid"] = json!(["CAT", "APE", "RA"]);
        rec["clues"][0]["answer"] = json!("CATS");
        rec["clues"][2]["number"] = json!(9);
        let report = run(&[rec]);
        assert_eq!(report.count(ViolationKind::GridShape), 1);
        assert_eq!(report.count(ViolationKind::AnswerLengthMismatch), 1);
        assert_eq!(report.count(ViolationKind::NotInGrid), 1);
    }

    #[test]
    fn numbering_must_increase_per_direction() {
        let mut rec = record("a.xd");
        rec["clues"][1]["number"] = json!(1);
        let report = run(&[rec]);
        assert_eq!(report.count(ViolationKind::NumberingOrder), 1);
    }

    #[test]
    fn invalid_values_and_bad_json() {
        let mut rec = record("a.xd");
        rec["size"] = json!("three by three");
        rec["clues"][0]["direction"] = json!("sideways");
        let mut v = Validator::new(&NullReporter);
        v.check(&RawLine { number: 1, text: rec.to_string(), unterminated: false });
        v.check(&RawLine { number: 2, text: "{not json".into(), unterminated: false });
        v.check(&RawLine { number: 3, text: "{\"key\":".into(), unterminated: true });
        let report = v.finish();
        assert_eq!(report.count(ViolationKind::InvalidSize), 1);
        assert_eq!(report.count(ViolationKind::InvalidDirection), 1);
        assert_eq!(report.count(ViolationKind::MalformedJson), 1);
        assert_eq!(report.count(ViolationKind::TruncatedRecord), 1);
        assert_eq!(report.total_records, 3);
        assert_eq!(report.valid_records, 0);
    }

    #[test]
    fn recommended_fields_are_counted() {
        let mut rec = record("a.xd");
        rec.as_object_mut().unwrap().remove("date");
        rec["author"] = json!("");
        let report = run(&[rec]);
        assert!(report.is_valid());
        assert_eq!(report.missing_recommended.get("date"), Some(&1));
        assert_eq!(report.missing_recommended.get("author"), Some(&1));
        assert_eq!(report.missing_recommended.get("day"), None);
    }

    #[test]
    fn content_warnings_do_not_invalidate() {
        let mut rec = record("a.xd");
        rec["clues"][0]["clue"] = json!("");
        rec["clues"][1]["answer"] = json!("AP3");
        let report = run(&[rec]);
        assert!(report.is_valid());
        assert_eq!(report.count(ViolationKind::EmptyClue), 1);
        assert_eq!(report.count(ViolationKind::UnusualAnswerChars), 1);
        assert_eq!(report.warning_count(), 2);
    }
}
