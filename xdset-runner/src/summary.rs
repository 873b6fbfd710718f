//! Flat CSV summary of the dataset, one row per record in output order.

use std::io;
use std::path::Path;

use tracing::warn;
use xdset_core::Puzzle;

use crate::fsio;
use crate::store::RecordReader;

pub const SUMMARY_COLUMNS: [&str; 9] = [
    "date",
    "day",
    "size",
    "num_clues",
    "avg_answer_length",
    "author",
    "publisher",
    "has_theme",
    "source",
];

/// One CSV row for a record.
pub fn summary_row(p: &Puzzle) -> [String; 9] {
    [
        p.date.map(|d| d.to_string()).unwrap_or_default(),
        p.day.clone(),
        p.size.to_string(),
        p.clues.len().to_string(),
        format!("{:.2}", p.avg_answer_length()),
        p.author.clone(),
        p.publisher.clone(),
        if p.has_theme() { "yes" } else { "no" }.to_string(),
        p.source.clone(),
    ]
}

/// Stream `dataset` and write the summary table to `csv_path` atomically.
/// Returns the number of rows written.
pub fn export_summary(dataset: &Path, csv_path: &Path) -> io::Result<usize> {
    let reader = RecordReader::open(dataset)?;
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(SUMMARY_COLUMNS)?;

    let mut rows = 0;
    for line in reader {
        let line = line?;
        match serde_json::from_str::<Puzzle>(&line.text) {
            Ok(p) => {
                wtr.write_record(summary_row(&p))?;
                rows += 1;
            }
            Err(e) => warn!(line = line.number, error = %e, "skipping malformed record"),
        }
    }

    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    fsio::write_atomic(csv_path, &bytes)?;
    Ok(rows)
}
