//! Progress and lifecycle callbacks for builds and validation runs.

use tracing::{debug, info, warn};
use xdset_core::FileKey;

use crate::pipeline::{FileOutcome, RunSummary};
use crate::validator::{Severity, ValidationReport, Violation};

/// Observer passed into the pipeline and the validator. Every hook has a
/// no-op default so implementors pick what they care about.
pub trait Reporter: Send + Sync {
    /// Called once after discovery with the number of selected files and
    /// how many of them the ledger already marks done.
    fn discovered(&self, _total: usize, _already_done: usize) {}

    /// Called on the writer thread after a file's outcome is durable.
    fn file_finished(&self, _key: &FileKey, _outcome: &FileOutcome, _index: usize, _total: usize) {}

    /// Called after each ledger snapshot.
    fn snapshot_written(&self, _entries: usize) {}

    fn build_finished(&self, _summary: &RunSummary) {}

    fn violation(&self, _violation: &Violation) {}

    fn validation_finished(&self, _report: &ValidationReport) {}
}

/// Forwards every hook to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn discovered(&self, total: usize, already_done: usize) {
        info!(total, already_done, "discovered input files");
    }

    fn file_finished(&self, key: &FileKey, outcome: &FileOutcome, index: usize, total: usize) {
        match outcome {
            FileOutcome::Parsed { clues, warnings } => {
                debug!(key = %key, clues, warnings, "[{}/{}] parsed", index + 1, total)
            }
            FileOutcome::Failed { reason } => {
                warn!(key = %key, reason = %reason, "[{}/{}] failed", index + 1, total)
            }
        }
    }

    fn snapshot_written(&self, entries: usize) {
        debug!(entries, "ledger snapshot written");
    }

    fn build_finished(&self, summary: &RunSummary) {
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            interrupted = summary.interrupted,
            "build finished"
        );
    }

    fn violation(&self, v: &Violation) {
        match v.severity {
            Severity::Error => warn!(line = v.line, kind = %v.kind, "{}", v.message),
            Severity::Warning => debug!(line = v.line, kind = %v.kind, "{}", v.message),
        }
    }

    fn validation_finished(&self, report: &ValidationReport) {
        info!(
            records = report.total_records,
            errors = report.error_count(),
            warnings = report.warning_count(),
            valid = report.is_valid(),
            "validation finished"
        );
    }
}

/// Silent reporter for tests and library callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {}
