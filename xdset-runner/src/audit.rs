//! Validator and analyzer over one dataset snapshot, in parallel.

use std::io;
use std::path::Path;

use serde::Serialize;

use crate::analyzer::{analyze_lines, AnalysisReport, SampleMode};
use crate::reporter::Reporter;
use crate::store::RecordReader;
use crate::validator::{validate_lines, ValidationReport};

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    /// Dataset bytes both passes read.
    pub boundary: u64,
    pub validation: ValidationReport,
    pub analysis: AnalysisReport,
}

/// Run both read-only passes concurrently. The file length is taken once
/// up front so both see the same records even if the file grows meanwhile.
pub fn audit(
    dataset: &Path,
    sample: Option<SampleMode>,
    reporter: &dyn Reporter,
) -> io::Result<AuditReport> {
    let boundary = std::fs::metadata(dataset)?.len();
    let (validation, analysis) = rayon::join(
        || validate_lines(RecordReader::open_bounded(dataset, boundary)?, reporter),
        || analyze_lines(RecordReader::open_bounded(dataset, boundary)?, sample),
    );
    Ok(AuditReport {
        boundary,
        validation: validation?,
        analysis: analysis?,
    })
}
