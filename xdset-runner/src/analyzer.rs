//! Single-pass corpus statistics.
//!
//! Everything is a running count, a sum, or an exact histogram over a small
//! domain (answer lengths, clue word counts), so memory does not grow with
//! the number of records. The one exception is the identity-key set used to
//! skip duplicate records, which grows with distinct keys.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;
use xdset_core::domain::{Direction, Puzzle};

use crate::fsio;
use crate::store::{RawLine, RecordReader};

// ─── Histogram ───────────────────────────────────────────────────────

/// Exact frequency histogram over non-negative integers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Histogram {
    counts: BTreeMap<usize, u64>,
}

impl Histogram {
    pub fn add(&mut self, value: usize) {
        *self.counts.entry(value).or_default() += 1;
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn min(&self) -> Option<usize> {
        self.counts.keys().next().copied()
    }

    pub fn max(&self) -> Option<usize> {
        self.counts.keys().next_back().copied()
    }

    pub fn mean(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let sum: u64 = self.counts.iter().map(|(&v, &n)| v as u64 * n).sum();
        Some(sum as f64 / total as f64)
    }

    /// The element at index `n / 2` of the sorted multiset.
    pub fn median(&self) -> Option<usize> {
        let target = self.total() / 2;
        let mut seen = 0;
        for (&value, &n) in &self.counts {
            seen += n;
            if seen > target {
                return Some(value);
            }
        }
        None
    }

    pub fn get(&self, value: usize) -> u64 {
        self.counts.get(&value).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.counts.iter().map(|(&v, &n)| (v, n))
    }

    pub fn summary(&self) -> Distribution {
        Distribution {
            count: self.total(),
            min: self.min(),
            max: self.max(),
            mean: self.mean(),
            median: self.median(),
        }
    }
}

/// Summary of one histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub count: u64,
    pub min: Option<usize>,
    pub max: Option<usize>,
    pub mean: Option<f64>,
    pub median: Option<usize>,
}

// ─── Sampling ────────────────────────────────────────────────────────

/// How representative records are picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SampleMode {
    /// The first `n` records encountered.
    First { n: usize },
    /// `n` records spread evenly over the whole stream.
    EvenlySpaced { n: usize },
    /// `n` records chosen uniformly at random, reproducible by seed.
    Random { n: usize, seed: u64 },
}

impl SampleMode {
    pub fn size(&self) -> usize {
        match *self {
            SampleMode::First { n } | SampleMode::EvenlySpaced { n } | SampleMode::Random { n, .. } => n,
        }
    }
}

/// A sampled record with its position among the unique records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub position: usize,
    pub record: Puzzle,
}

/// Bounded sample buffer. Never holds more than `2 * n` records.
struct Sampler {
    mode: SampleMode,
    buf: Vec<Sample>,
    stride: usize,
    rng: Option<StdRng>,
}

impl Sampler {
    fn new(mode: SampleMode) -> Self {
        let rng = match mode {
            SampleMode::Random { seed, .. } => Some(StdRng::seed_from_u64(seed)),
            _ => None,
        };
        Self {
            mode,
            buf: Vec::new(),
            stride: 1,
            rng,
        }
    }

    fn offer(&mut self, position: usize, record: &Puzzle) {
        let n = self.mode.size();
        if n == 0 {
            return;
        }
        match self.mode {
            SampleMode::First { .. } => {
                if self.buf.len() < n {
                    self.buf.push(Sample { position, record: record.clone() });
                }
            }
            SampleMode::EvenlySpaced { .. } => {
                if position % self.stride != 0 {
                    return;
                }
                self.buf.push(Sample { position, record: record.clone() });
                if self.buf.len() > 2 * n {
                    // Keep every other kept record and double the stride.
                    let stride = self.stride * 2;
                    self.buf.retain(|s| s.position % stride == 0);
                    self.stride = stride;
                }
            }
            SampleMode::Random { .. } => {
                if self.buf.len() < n {
                    self.buf.push(Sample { position, record: record.clone() });
                } else if let Some(rng) = self.rng.as_mut() {
                    let j = rng.gen_range(0..=position);
                    if j < n {
                        self.buf[j] = Sample { position, record: record.clone() };
                    }
                }
            }
        }
    }

    fn finish(mut self) -> Vec<Sample> {
        let n = self.mode.size();
        if let SampleMode::EvenlySpaced { .. } = self.mode {
            if self.buf.len() > n {
                let len = self.buf.len();
                let picked: Vec<usize> = (0..n).map(|i| i * len / n).collect();
                let mut kept = Vec::with_capacity(n);
                for (i, sample) in self.buf.into_iter().enumerate() {
                    if picked.binary_search(&i).is_ok() {
                        kept.push(sample);
                    }
                }
                self.buf = kept;
            }
        }
        self.buf.sort_by_key(|s| s.position);
        self.buf
    }
}

// ─── Statistics ──────────────────────────────────────────────────────

/// Aggregates over unique records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_records: usize,
    pub duplicates_skipped: usize,
    pub malformed_skipped: usize,
    pub total_clues: usize,
    pub across_clues: usize,
    pub down_clues: usize,
    pub records_with_theme: usize,
    pub by_day: BTreeMap<String, usize>,
    pub by_size: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
    pub by_publisher: BTreeMap<String, usize>,
    pub by_author: BTreeMap<String, usize>,
    pub by_year: BTreeMap<i32, usize>,
    pub answer_length: Histogram,
    pub clue_word_count: Histogram,
}

impl Statistics {
    pub fn avg_clues_per_record(&self) -> f64 {
        if self.total_records == 0 {
            return 0.0;
        }
        self.total_clues as f64 / self.total_records as f64
    }

    fn add(&mut self, p: &Puzzle) {
        self.total_records += 1;
        self.total_clues += p.clues.len();
        self.across_clues += p.clues_in(Direction::Across).count();
        self.down_clues += p.clues_in(Direction::Down).count();
        if p.has_theme() {
            self.records_with_theme += 1;
        }

        bump(&mut self.by_day, or_unknown(&p.day));
        bump(&mut self.by_size, &p.size.to_string());
        bump(&mut self.by_source, or_unknown(&p.source));
        bump(&mut self.by_publisher, or_unknown(&p.publisher));
        bump(&mut self.by_author, or_unknown(&p.author));
        if let Some(year) = p.year() {
            *self.by_year.entry(year).or_default() += 1;
        }

        for clue in &p.clues {
            let len = clue.answer_len();
            if len > 0 {
                self.answer_length.add(len);
            }
            self.clue_word_count.add(clue.word_count());
        }
    }
}

fn bump(map: &mut BTreeMap<String, usize>, key: &str) {
    match map.get_mut(key) {
        Some(n) => *n += 1,
        None => {
            map.insert(key.to_string(), 1);
        }
    }
}

fn or_unknown(s: &str) -> &str {
    if s.trim().is_empty() {
        "unknown"
    } else {
        s
    }
}

/// Highest counts first; ties broken by key.
pub fn top_n<K: Ord + Clone>(map: &BTreeMap<K, usize>, n: usize) -> Vec<(K, usize)> {
    let mut items: Vec<(K, usize)> = map.iter().map(|(k, &v)| (k.clone(), v)).collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items.truncate(n);
    items
}

// ─── Analyzer ────────────────────────────────────────────────────────

/// Exported statistics: raw aggregates, derived summaries, samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub statistics: Statistics,
    pub avg_clues_per_record: f64,
    pub answer_length: Distribution,
    pub clue_word_count: Distribution,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<Sample>,
}

impl AnalysisReport {
    /// Pretty JSON, replaced atomically.
    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fsio::write_atomic(path, &bytes)
    }
}

pub struct Analyzer {
    seen: HashSet<String>,
    stats: Statistics,
    sampler: Option<Sampler>,
}

impl Analyzer {
    pub fn new(sample: Option<SampleMode>) -> Self {
        Self {
            seen: HashSet::new(),
            stats: Statistics::default(),
            sampler: sample.map(Sampler::new),
        }
    }

    /// Decode and add one dataset line; malformed lines are counted and skipped.
    pub fn add_line(&mut self, raw: &RawLine) {
        match serde_json::from_str::<Puzzle>(&raw.text) {
            Ok(puzzle) => self.add(&puzzle),
            Err(e) => {
                debug!(line = raw.number, error = %e, "skipping malformed record");
                self.stats.malformed_skipped += 1;
            }
        }
    }

    /// Add one record unless its identity key was already counted.
    pub fn add(&mut self, puzzle: &Puzzle) {
        if !self.seen.insert(puzzle.identity_key()) {
            self.stats.duplicates_skipped += 1;
            return;
        }
        let position = self.stats.total_records;
        self.stats.add(puzzle);
        if let Some(sampler) = self.sampler.as_mut() {
            sampler.offer(position, puzzle);
        }
    }

    pub fn finish(self) -> AnalysisReport {
        AnalysisReport {
            avg_clues_per_record: self.stats.avg_clues_per_record(),
            answer_length: self.stats.answer_length.summary(),
            clue_word_count: self.stats.clue_word_count.summary(),
            samples: self.sampler.map(Sampler::finish).unwrap_or_default(),
            statistics: self.stats,
        }
    }
}

/// Analyze a dataset file in one pass.
pub fn analyze_file(path: &Path, sample: Option<SampleMode>) -> io::Result<AnalysisReport> {
    analyze_lines(RecordReader::open(path)?, sample)
}

pub fn analyze_lines(
    lines: impl IntoIterator<Item = io::Result<RawLine>>,
    sample: Option<SampleMode>,
) -> io::Result<AnalysisReport> {
    let mut analyzer = Analyzer::new(sample);
    for line in lines {
        analyzer.add_line(&line?);
    }
    Ok(analyzer.finish())
}
