//! Attendance ledger: the set of people credited this run, mirrored row for
//! row in an append-only CSV file.

use crate::types::Identity;
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const HEADER: [&str; 2] = ["Name", "Time"];

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("could not create {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
    /// The row was accepted by the writer but could not be flushed yet.
    /// It stays buffered and is counted; a later flush writes it.
    #[error("{} recorded but not yet flushed: {source}", record.name)]
    Flush {
        record: AttendanceRecord,
        source: std::io::Error,
    },
}

/// One attendance row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub name: String,
    pub time: String,
}

/// File name for a ledger opened at `now`, e.g. `18-10-2026_09-05-00.csv`.
pub fn file_name(now: DateTime<Local>) -> String {
    format!("{}.csv", now.format("%d-%m-%Y_%H-%M-%S"))
}

/// Local wall-clock time of day as `HH:MM:SS`.
pub fn time_of_day(now: DateTime<Local>) -> String {
    now.format("%H:%M:%S").to_string()
}

pub struct AttendanceLedger<W: Write> {
    writer: W,
    recognized: HashSet<String>,
    records: Vec<AttendanceRecord>,
    path: Option<PathBuf>,
}

impl AttendanceLedger<BufWriter<File>> {
    /// Create (or truncate) the run's CSV file in `dir` and write the header.
    pub fn create(dir: &Path, now: DateTime<Local>) -> Result<Self, LedgerError> {
        let path = dir.join(file_name(now));
        let file = File::create(&path).map_err(|source| LedgerError::Create {
            path: path.clone(),
            source,
        })?;
        let mut ledger = Self::new(BufWriter::new(file))?;
        tracing::info!(path = %path.display(), "attendance file created");
        ledger.path = Some(path);
        Ok(ledger)
    }
}

impl<W: Write> AttendanceLedger<W> {
    /// Wrap a writer, emitting the header row immediately.
    pub fn new(mut writer: W) -> Result<Self, LedgerError> {
        writer.write_all(format_row(&HEADER).as_bytes())?;
        writer.flush()?;
        Ok(Self {
            writer,
            recognized: HashSet::new(),
            records: Vec::new(),
            path: None,
        })
    }

    /// Credit `identity` with attendance at `time`, at most once per run.
    ///
    /// Returns the new record, or `None` for unknown faces and people already
    /// credited.
    ///
    /// The row goes to the writer in one `write_all`. If that fails the
    /// ledger is unchanged. Once the writer has taken the row the name is
    /// credited, because buffered bytes survive a failed flush and land on
    /// the next one; that case is reported as [`LedgerError::Flush`].
    pub fn record(&mut self, identity: &Identity, time: &str) -> Result<Option<AttendanceRecord>, LedgerError> {
        let Identity::Known(name) = identity else {
            return Ok(None);
        };
        if self.recognized.contains(name) {
            return Ok(None);
        }

        let row = format_row(&[name.as_str(), time]);
        self.writer.write_all(row.as_bytes())?;

        self.recognized.insert(name.clone());
        let record = AttendanceRecord {
            name: name.clone(),
            time: time.to_string(),
        };
        self.records.push(record.clone());

        if let Err(source) = self.writer.flush() {
            return Err(LedgerError::Flush { record, source });
        }
        tracing::debug!(name = %record.name, time = %record.time, "attendance recorded");
        Ok(Some(record))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.recognized.contains(name)
    }

    /// Number of distinct people credited so far.
    pub fn count(&self) -> usize {
        self.recognized.len()
    }

    /// Records in the order they were written.
    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flush and hand back the writer; dropping it closes the file.
    pub fn into_inner(mut self) -> Result<W, LedgerError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

fn format_row(fields: &[&str]) -> String {
    let mut line = fields.iter().map(|f| escape_field(f)).collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}

/// Quote a field when it holds a delimiter, quote or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
