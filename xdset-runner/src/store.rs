//! Append-only JSONL dataset and failure log.
//!
//! Every record is one JSON object on one line. A record is written with a
//! single `write_all` of the whole terminated line, then synced, so a crash
//! can at worst leave an unterminated tail. Opening a store cuts such a tail
//! back to the last newline before anything is appended; the torn record was
//! never acknowledged, so the pipeline parses its file again.
//!
//! Only the pipeline writer thread holds an [`OutputStore`] or a
//! [`FailureLog`]; readers use [`RecordReader`].

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::warn;
use xdset_core::FileKey;

/// Append handle for the dataset file.
pub struct OutputStore {
    path: PathBuf,
    file: File,
    appended: usize,
}

impl OutputStore {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = open_append(path)?;
        if let Some(dropped) = truncate_torn_tail(&file)? {
            warn!(path = %path.display(), dropped, "dataset ended mid-record, dropped the torn tail");
        }
        Ok(Self {
            path: path.to_path_buf(),
            file,
            appended: 0,
        })
    }

    /// Serialize and append one record, durably.
    pub fn append<T: Serialize>(&mut self, record: &T) -> io::Result<()> {
        let mut line = serde_json::to_vec(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.sync_data()?;
        self.appended += 1;
        Ok(())
    }

    /// Records appended through this handle.
    pub fn appended(&self) -> usize {
        self.appended
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One failure: when, which file, why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub timestamp: DateTime<Utc>,
    pub key: FileKey,
    pub reason: String,
}

/// Append handle for `failures.log`: CSV rows of `timestamp,file_key,reason`.
pub struct FailureLog {
    file: File,
}

impl FailureLog {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = open_append(path)?;
        if let Some(dropped) = truncate_torn_tail(&file)? {
            warn!(path = %path.display(), dropped, "failure log ended mid-row, dropped the torn tail");
        }
        Ok(Self { file })
    }

    pub fn append(&mut self, record: &FailureRecord) -> io::Result<()> {
        let timestamp = record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        wtr.write_record([timestamp.as_str(), record.key.as_str(), record.reason.as_str()])
            .map_err(io::Error::other)?;
        let line = wtr.into_inner().map_err(|e| io::Error::other(e.to_string()))?;
        self.file.write_all(&line)?;
        self.file.sync_data()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
}

const TAIL_CHUNK: u64 = 8 * 1024;

/// Cut everything after the last newline. Returns the number of bytes
/// dropped, or `None` when the file already ends cleanly.
fn truncate_torn_tail(file: &File) -> io::Result<Option<u64>> {
    let len = file.metadata()?.len();
    let mut reader = file;
    let mut end = len;
    let mut chunk = Vec::new();
    let keep = loop {
        if end == 0 {
            break 0;
        }
        let start = end.saturating_sub(TAIL_CHUNK);
        chunk.resize((end - start) as usize, 0);
        reader.seek(SeekFrom::Start(start))?;
        reader.read_exact(&mut chunk)?;
        if let Some(i) = chunk.iter().rposition(|&b| b == b'\n') {
            break start + i as u64 + 1;
        }
        end = start;
    };
    if keep == len {
        return Ok(None);
    }
    file.set_len(keep)?;
    file.sync_data()?;
    Ok(Some(len - keep))
}

// ── Reading ──────────────────────────────────────────────────────────

/// One physical line of the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 1-based line number.
    pub number: usize,
    pub text: String,
    /// The file ended without a newline after this line.
    pub unterminated: bool,
}

/// Streams dataset lines up to the length observed at open.
///
/// Lines appended after open are not visible, which gives each reader a
/// fixed snapshot boundary even while a writer is active.
pub struct RecordReader {
    inner: io::Take<BufReader<File>>,
    number: usize,
    buf: Vec<u8>,
}

impl RecordReader {
    pub fn open(path: &Path) -> io::Result<Self> {
        Self::open_bounded(path, u64::MAX)
    }

    /// Like [`RecordReader::open`], but never past `limit` bytes. Lets
    /// several readers share one boundary.
    pub fn open_bounded(path: &Path, limit: u64) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len().min(limit);
        Ok(Self {
            inner: BufReader::new(file).take(len),
            number: 0,
            buf: Vec::new(),
        })
    }
}

impl Iterator for RecordReader {
    type Item = io::Result<RawLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.inner.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
            self.number += 1;
            let unterminated = self.buf.last() != Some(&b'\n');
            let text = String::from_utf8_lossy(&self.buf).trim_end().to_string();
            if text.is_empty() {
                continue;
            }
            return Some(Ok(RawLine {
                number: self.number,
                text,
                unterminated,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let mut store = OutputStore::open(&path).unwrap();
        store.append(&json!({"a": 1})).unwrap();
        store.append(&json!({"a": 2})).unwrap();
        assert_eq!(store.appended(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}\n{\"a\":2}\n");
    }

    #[test]
    fn torn_tail_is_dropped_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        fs::write(&path, "{\"a\":1}\n{\"a\":").unwrap();

        let mut store = OutputStore::open(&path).unwrap();
        store.append(&json!({"a": 3})).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}\n{\"a\":3}\n");
    }

    #[test]
    fn torn_first_record_leaves_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let big = format!("{{\"text\":\"{}", "x".repeat(20_000));
        fs::write(&path, &big).unwrap();

        OutputStore::open(&path).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn clean_file_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        fs::write(&path, "{\"a\":1}\n").unwrap();
        let file = OpenOptions::new().read(true).append(true).open(&path).unwrap();
        assert_eq!(truncate_torn_tail(&file).unwrap(), None);
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}\n");
    }

    #[test]
    fn failure_log_drops_torn_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failures.log");
        fs::write(&path, "2024-01-15T10:00:00Z,a.xd,bad\n2024-01-15T10:00:01Z,b.").unwrap();
        FailureLog::open(&path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "2024-01-15T10:00:00Z,a.xd,bad\n"
        );
    }

    #[test]
    fn reader_flags_unterminated_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        fs::write(&path, "{\"a\":1}\n\n{\"a\":").unwrap();
        let lines: Vec<RawLine> = RecordReader::open(&path).unwrap().map(Result::unwrap).collect();
        assert_eq!(lines.len(), 2);
        assert!(!lines[0].unterminated);
        assert!(lines[1].unterminated);
        assert_eq!(lines[1].number, 3);
    }

    #[test]
    fn reader_stops_at_length_seen_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let mut store = OutputStore::open(&path).unwrap();
        store.append(&json!({"a": 1})).unwrap();

        let reader = RecordReader::open(&path).unwrap();
        store.append(&json!({"a": 2})).unwrap();
        assert_eq!(reader.count(), 1);
    }

    #[test]
    fn failure_log_writes_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failures.log");
        let mut log = FailureLog::open(&path).unwrap();
        let timestamp = DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        log.append(&FailureRecord {
            timestamp,
            key: "nyt/bad.xd".into(),
            reason: "malformed clue line (line 7), near \"x\"".into(),
        })
        .unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "2024-01-15T10:00:00Z,nyt/bad.xd,\"malformed clue line (line 7), near \"\"x\"\"\"\n"
        );
    }
}
