//! xdset runner: builds, validates and summarizes a puzzle dataset.
//!
//! This crate builds on `xdset-core` to provide:
//! - Pipeline configuration (TOML) and output layout
//! - Sorted, limited input discovery
//! - Append-only dataset store and failure log
//! - Durable ledger with atomic snapshots for resumable builds
//! - Parallel parse with a single writer
//! - Streaming validator and statistics analyzer
//! - CSV summary export

pub mod analyzer;
pub mod audit;
pub mod config;
pub mod discovery;
pub mod fsio;
pub mod ledger;
pub mod pipeline;
pub mod reporter;
pub mod store;
pub mod summary;
pub mod validator;

pub use analyzer::{analyze_file, AnalysisReport, Analyzer, Histogram, SampleMode, Statistics};
pub use audit::{audit, AuditReport};
pub use config::{ConfigError, OutputLayout, PipelineConfig};
pub use discovery::{discover, DiscoveryError, SourceFile};
pub use ledger::{Ledger, LedgerEntry, LedgerError, Outcome};
pub use pipeline::{FileOutcome, Pipeline, PipelineError, RunSummary};
pub use reporter::{NullReporter, Reporter, TracingReporter};
pub use store::{FailureLog, FailureRecord, OutputStore, RawLine, RecordReader};
pub use summary::export_summary;
pub use validator::{validate_file, Severity, ValidationReport, Validator, Violation, ViolationKind};
