//! Resumable dataset build.
//!
//! Discovery selects a sorted, optionally limited file list. Files the
//! ledger marks done are skipped unless `force` is set. The rest are parsed
//! on a private rayon pool; each worker sends its result over a bounded
//! channel to the single writer, which is the calling thread.
//!
//! The writer owns the dataset, the failure log and the ledger. For every
//! result it makes the data durable first (record or failure row) and only
//! then updates the ledger. The ledger is snapshotted every
//! `snapshot_every` files and once more on the way out, whether the run
//! completed or was cancelled.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use xdset_core::parser::{parse_file, ParseFileError};
use xdset_core::{FileKey, Puzzle};

use crate::config::{ConfigError, OutputLayout, PipelineConfig};
use crate::discovery::{discover, DiscoveryError, SourceFile};
use crate::fsio;
use crate::ledger::{Ledger, LedgerError};
use crate::reporter::Reporter;
use crate::store::{FailureLog, FailureRecord, OutputStore};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("output directory {path} is not writable: {source}")]
    OutputUnwritable { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("write {path}: {source}")]
    Store { path: PathBuf, source: io::Error },
    #[error("build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// What happened to one file, as seen by the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Parsed { clues: usize, warnings: usize },
    Failed { reason: String },
}

/// Counts reported at the end of every run, failed or not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Files selected by discovery (after `limit`).
    pub discovered: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Already done according to the ledger.
    pub skipped: usize,
    /// Cancelled before every selected file was handled.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }
}

type WorkerResult = (FileKey, Result<Puzzle, ParseFileError>);

pub struct Pipeline {
    config: PipelineConfig,
    layout: OutputLayout,
}

impl Pipeline {
    /// Validate the config and make sure the output directory is writable.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let layout = config.layout();
        ensure_writable(layout.root())?;
        Ok(Self { config, layout })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Run one build.
    ///
    /// `cancel` is polled by workers before each file and by the writer
    /// before each result. Once set, no further result is acknowledged;
    /// the ledger is snapshotted and the partial summary returned.
    pub fn run(
        &self,
        cancel: Option<&AtomicBool>,
        reporter: &dyn Reporter,
    ) -> Result<RunSummary, PipelineError> {
        let config = &self.config;
        info!(
            input = %config.input_dir.display(),
            output = %self.layout.root().display(),
            force = config.force,
            "starting build"
        );

        let mut ledger = Ledger::load(&self.layout.ledger())?;
        let mut writer = Writer {
            store: open_store(&self.layout.dataset(), OutputStore::open)?,
            failures: open_store(&self.layout.failures(), FailureLog::open)?,
            failures_path: self.layout.failures(),
            ledger: &mut ledger,
            reporter,
            snapshot_every: config.snapshot_every,
        };

        let files = discover(&config.input_dir, &config.extension, config.limit)?;
        let (todo, done): (Vec<SourceFile>, Vec<SourceFile>) = files
            .into_iter()
            .partition(|f| config.force || !writer.ledger.is_done(&f.key));

        let mut summary = RunSummary {
            discovered: todo.len() + done.len(),
            skipped: done.len(),
            ..RunSummary::default()
        };
        reporter.discovered(summary.discovered, summary.skipped);

        let drained = if todo.is_empty() {
            Ok(())
        } else {
            self.parse_all(&todo, cancel, &mut writer, &mut summary)
        };

        // Snapshot on every exit path; a fatal write error still keeps
        // the acknowledged entries.
        writer.ledger.snapshot()?;
        reporter.snapshot_written(writer.ledger.len());
        drained?;

        summary.interrupted = summary.processed() < todo.len();
        reporter.build_finished(&summary);
        Ok(summary)
    }

    fn parse_all(
        &self,
        todo: &[SourceFile],
        cancel: Option<&AtomicBool>,
        writer: &mut Writer<'_>,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        let workers = self.config.effective_workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("xdset-parse-{i}"))
            .build()?;
        let (tx, rx) = mpsc::sync_channel::<WorkerResult>(workers * 2);
        let stop = AtomicBool::new(false);
        let source = self.config.source.as_str();

        thread::scope(|s| {
            let pool = &pool;
            let stop = &stop;
            s.spawn(move || {
                pool.install(|| {
                    todo.par_iter().for_each_with(tx, |tx, file| {
                        if is_cancelled(cancel) || stop.load(Ordering::Relaxed) {
                            return;
                        }
                        let result = parse_source(file, source);
                        // Receiver gone means the writer stopped; nothing to do.
                        let _ = tx.send((file.key.clone(), result));
                    })
                })
            });

            let result = writer.drain(rx, todo.len(), cancel, summary);
            stop.store(true, Ordering::Relaxed);
            result
        })
    }
}

/// Parse one file and stamp its provenance.
pub fn parse_source(file: &SourceFile, source: &str) -> Result<Puzzle, ParseFileError> {
    let mut puzzle = parse_file(&file.path)?;
    puzzle.key = file.key.clone();
    puzzle.source = source.to_string();
    puzzle.source_file = file
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(puzzle)
}

/// The single owner of every durable artifact during a run.
struct Writer<'a> {
    store: OutputStore,
    failures: FailureLog,
    failures_path: PathBuf,
    ledger: &'a mut Ledger,
    reporter: &'a dyn Reporter,
    snapshot_every: usize,
}

impl Writer<'_> {
    fn drain(
        &mut self,
        rx: Receiver<WorkerResult>,
        total: usize,
        cancel: Option<&AtomicBool>,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        let mut since_snapshot = 0;

        for (key, result) in rx {
            if is_cancelled(cancel) {
                warn!(acknowledged = summary.processed(), total, "build cancelled");
                break;
            }

            let outcome = self.commit(&key, result)?;
            match outcome {
                FileOutcome::Parsed { .. } => summary.succeeded += 1,
                FileOutcome::Failed { .. } => summary.failed += 1,
            }
            self.reporter
                .file_finished(&key, &outcome, summary.processed() - 1, total);

            since_snapshot += 1;
            if since_snapshot >= self.snapshot_every {
                self.ledger.snapshot()?;
                self.reporter.snapshot_written(self.ledger.len());
                since_snapshot = 0;
            }
        }
        Ok(())
    }

    /// Data first, ledger second.
    fn commit(
        &mut self,
        key: &FileKey,
        result: Result<Puzzle, ParseFileError>,
    ) -> Result<FileOutcome, PipelineError> {
        match result {
            Ok(puzzle) => {
                self.store.append(&puzzle).map_err(|source| PipelineError::Store {
                    path: self.store.path().to_path_buf(),
                    source,
                })?;
                self.ledger.record_success(key.clone());
                let warnings =
                    puzzle.warnings.len() + puzzle.clues.iter().map(|c| c.warnings.len()).sum::<usize>();
                Ok(FileOutcome::Parsed {
                    clues: puzzle.clues.len(),
                    warnings,
                })
            }
            Err(err) => {
                let reason = match err {
                    ParseFileError::Format(e) => e.to_string(),
                    ParseFileError::Io(e) => format!("io error: {e}"),
                };
                let record = FailureRecord {
                    timestamp: Utc::now(),
                    key: key.clone(),
                    reason: reason.clone(),
                };
                self.failures
                    .append(&record)
                    .map_err(|source| PipelineError::Store {
                        path: self.failures_path.clone(),
                        source,
                    })?;
                self.ledger.record_failure(key.clone());
                Ok(FileOutcome::Failed { reason })
            }
        }
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|f| f.load(Ordering::Relaxed))
}

fn open_store<T>(path: &Path, open: fn(&Path) -> io::Result<T>) -> Result<T, PipelineError> {
    open(path).map_err(|source| PipelineError::Store {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_writable(root: &Path) -> Result<(), PipelineError> {
    let unwritable = |source| PipelineError::OutputUnwritable {
        path: root.to_path_buf(),
        source,
    };
    fs::create_dir_all(root).map_err(unwritable)?;
    let probe = root.join(".xdset-write-probe");
    fsio::write_atomic(&probe, b"").map_err(unwritable)?;
    fs::remove_file(&probe).map_err(unwritable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;
    use crate::store::RecordReader;

    const GOOD: &str = "Title: T\n\nCAT\nAPE\nRAT\n\nA1. Feline ~ CAT\nA4. Primate ~ APE\n";

    fn setup(files: &[(&str, &str)]) -> (tempfile::TempDir, PipelineConfig) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw");
        for (name, content) in files {
            let path = input.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let mut config = PipelineConfig::new(input, dir.path().join("out"));
        config.workers = 2;
        (dir, config)
    }

    #[test]
    fn good_and_bad_files_are_isolated() {
        let (_dir, config) = setup(&[("a.xd", GOOD), ("b.xd", "Title: x\n\nCAT\nAP\nRAT\n\nA1. x ~ CAT\n")]);
        let pipeline = Pipeline::new(config).unwrap();
        let summary = pipeline.run(None, &NullReporter).unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 0);
        assert!(!summary.interrupted);

        let lines: Vec<_> = RecordReader::open(&pipeline.layout().dataset())
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(lines.len(), 1);
        let puzzle: Puzzle = serde_json::from_str(&lines[0].text).unwrap();
        assert_eq!(puzzle.key.as_str(), "a.xd");
        assert_eq!(puzzle.source, "xd");
        assert_eq!(puzzle.source_file, "a.xd");

        let failures = fs::read_to_string(pipeline.layout().failures()).unwrap();
        assert!(failures.contains(",b.xd,"));
        assert!(failures.contains("(line 4)"));
    }

    #[test]
    fn done_files_are_skipped_failures_retried() {
        let (_dir, config) = setup(&[("a.xd", GOOD), ("b.xd", "junk")]);
        let pipeline = Pipeline::new(config).unwrap();
        pipeline.run(None, &NullReporter).unwrap();
        let second = pipeline.run(None, &NullReporter).unwrap();
        assert_eq!(second.skipped, 1);
        assert_eq!(second.failed, 1);
        assert_eq!(second.succeeded, 0);
    }

    #[test]
    fn force_reprocesses_everything() {
        let (_dir, mut config) = setup(&[("a.xd", GOOD)]);
        let pipeline = Pipeline::new(config.clone()).unwrap();
        pipeline.run(None, &NullReporter).unwrap();

        config.force = true;
        let forced = Pipeline::new(config).unwrap();
        let summary = forced.run(None, &NullReporter).unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped, 0);
        // Re-appended, not edited in place.
        assert_eq!(RecordReader::open(&forced.layout().dataset()).unwrap().count(), 2);
    }

    #[test]
    fn pre_cancelled_run_acknowledges_nothing() {
        let (_dir, config) = setup(&[("a.xd", GOOD), ("b.xd", GOOD)]);
        let pipeline = Pipeline::new(config).unwrap();
        let cancel = AtomicBool::new(true);
        let summary = pipeline.run(Some(&cancel), &NullReporter).unwrap();
        assert_eq!(summary.processed(), 0);
        assert!(summary.interrupted);
        assert!(pipeline.layout().ledger().exists());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let (_dir, mut config) = setup(&[]);
        config.snapshot_every = 0;
        assert!(matches!(Pipeline::new(config), Err(PipelineError::Config(_))));
    }

    #[test]
    fn output_path_that_is_a_file_is_fatal_at_startup() {
        let (dir, mut config) = setup(&[("a.xd", GOOD)]);
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();
        config.output_dir = blocker.clone();
        match Pipeline::new(config) {
            Err(PipelineError::OutputUnwritable { path, .. }) => assert_eq!(path, blocker),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("pipeline accepted a file as output directory"),
        }
    }

    #[test]
    fn missing_input_dir_is_fatal() {
        let (dir, mut config) = setup(&[]);
        config.input_dir = dir.path().join("missing");
        let pipeline = Pipeline::new(config).unwrap();
        let err = pipeline.run(None, &NullReporter).unwrap_err();
        assert!(matches!(err, PipelineError::Discovery(_)));
    }
}
