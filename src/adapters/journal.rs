//! Step journal: append-only report storage.
//!
//! Each entry is a `postcard` message framed with COBS, so the file is a
//! sequence of zero-terminated frames:
//!
//! ```text
//!   [cobs(Step)] 00 [cobs(Step)] 00 ... [cobs(Finalized)] 00
//! ```
//!
//! A torn write at the end of the file (a frame without its terminator) is
//! ignored on read and cut off when the journal is reopened for writing.  Report ids are allocated by scanning the journal for
//! the highest id seen.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::events::{ReportId, SampleRecord};
use crate::app::ports::PersistencePort;
use crate::error::PersistenceError;

/// One journal frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalEntry {
    Step {
        report: ReportId,
        record: SampleRecord,
    },
    Finalized {
        report: ReportId,
        end_timestamp_ms: u64,
    },
}

impl JournalEntry {
    pub fn report(&self) -> ReportId {
        match self {
            Self::Step { report, .. } | Self::Finalized { report, .. } => *report,
        }
    }
}

/// Encode one entry as a zero-terminated COBS frame.
pub fn encode_entry(entry: &JournalEntry) -> Result<Vec<u8>, PersistenceError> {
    postcard::to_allocvec_cobs(entry).map_err(|_| PersistenceError::Codec)
}

/// Decode every complete frame in `bytes` (decoded in place).
pub fn decode_journal(bytes: &mut [u8]) -> Result<Vec<JournalEntry>, PersistenceError> {
    let mut entries = Vec::new();
    for frame in bytes.split_inclusive_mut(|b| *b == 0) {
        if frame.last() != Some(&0) {
            debug!("journal: ignoring torn trailing frame ({} bytes)", frame.len());
            continue;
        }
        if frame.len() == 1 {
            continue;
        }
        let entry: JournalEntry =
            postcard::from_bytes_cobs(frame).map_err(|_| PersistenceError::Codec)?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Read and decode a journal file.  A missing file is an empty journal.
pub fn read_journal(path: &Path) -> Result<Vec<JournalEntry>, PersistenceError> {
    let mut bytes = read_bytes(path)?;
    decode_journal(&mut bytes)
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, PersistenceError> {
    let mut bytes = Vec::new();
    match File::open(path) {
        Ok(mut f) => {
            f.read_to_end(&mut bytes)
                .map_err(|_| PersistenceError::IoError)?;
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(bytes),
        Err(_) => Err(PersistenceError::IoError),
    }
}

/// Length of the prefix made of complete (zero-terminated) frames.
pub fn complete_len(bytes: &[u8]) -> usize {
    bytes.iter().rposition(|b| *b == 0).map_or(0, |i| i + 1)
}

/// One past the highest report id in `entries`, starting at 1.
pub fn next_report_id(entries: &[JournalEntry]) -> ReportId {
    entries
        .iter()
        .map(|e| e.report().0)
        .max()
        .map_or(ReportId(1), |max| ReportId(max.saturating_add(1)))
}

fn closed_reports(entries: &[JournalEntry]) -> BTreeSet<ReportId> {
    entries
        .iter()
        .filter_map(|e| match e {
            JournalEntry::Finalized { report, .. } => Some(*report),
            JournalEntry::Step { .. } => None,
        })
        .collect()
}

// ───────────────────────────────────────────────────────────────
// File journal
// ───────────────────────────────────────────────────────────────

pub struct FileJournal {
    path: PathBuf,
    file: File,
    closed: BTreeSet<ReportId>,
    next_id: ReportId,
    /// A write failed part way; terminate its bytes before the next frame.
    resync: bool,
}

impl FileJournal {
    /// Open (or create) the journal at `path` and scan it.  A torn frame
    /// left by an interrupted write is cut off so new frames start clean.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let mut bytes = read_bytes(&path)?;
        let complete = complete_len(&bytes);
        let torn = bytes.len() > complete;
        bytes.truncate(complete);
        let existing = decode_journal(&mut bytes)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|_| PersistenceError::IoError)?;
        if torn {
            warn!(
                "Journal {}: dropping torn frame after byte {}",
                path.display(),
                complete
            );
            file.set_len(complete as u64)
                .map_err(|_| PersistenceError::IoError)?;
        }
        info!(
            "Journal {}: {} entries, next report {}",
            path.display(),
            existing.len(),
            next_report_id(&existing)
        );
        Ok(Self {
            closed: closed_reports(&existing),
            next_id: next_report_id(&existing),
            path,
            file,
            resync: false,
        })
    }

    /// Id the next run should use.
    pub fn next_report_id(&self) -> ReportId {
        self.next_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, entry: &JournalEntry) -> Result<(), PersistenceError> {
        if self.closed.contains(&entry.report()) {
            return Err(PersistenceError::ReportClosed);
        }
        let mut frame = encode_entry(entry)?;
        if self.resync {
            // An empty frame is skipped by the decoder.
            frame.insert(0, 0);
        }
        self.resync = true;
        self.file.write_all(&frame).map_err(|e| {
            warn!("Journal write failed: {}", e);
            PersistenceError::IoError
        })?;
        self.file.flush().map_err(|_| PersistenceError::IoError)?;
        self.resync = false;
        Ok(())
    }
}

impl PersistencePort for FileJournal {
    fn append_step(&mut self, report: ReportId, record: &SampleRecord) -> Result<(), PersistenceError> {
        self.append(&JournalEntry::Step {
            report,
            record: record.clone(),
        })
    }

    fn finalize_report(&mut self, report: ReportId, end_timestamp_ms: u64) -> Result<(), PersistenceError> {
        self.append(&JournalEntry::Finalized {
            report,
            end_timestamp_ms,
        })?;
        self.file.sync_data().map_err(|_| PersistenceError::IoError)?;
        self.closed.insert(report);
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Memory journal
// ───────────────────────────────────────────────────────────────

/// Journal held in memory; used when no journal path is configured.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    entries: Vec<JournalEntry>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Steps recorded for `report`, in order.
    pub fn steps(&self, report: ReportId) -> impl Iterator<Item = &SampleRecord> {
        self.entries.iter().filter_map(move |e| match e {
            JournalEntry::Step { report: r, record } if *r == report => Some(record),
            _ => None,
        })
    }

    pub fn is_finalized(&self, report: ReportId) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, JournalEntry::Finalized { report: r, .. } if *r == report))
    }
}

impl PersistencePort for MemoryJournal {
    fn append_step(&mut self, report: ReportId, record: &SampleRecord) -> Result<(), PersistenceError> {
        if self.is_finalized(report) {
            return Err(PersistenceError::ReportClosed);
        }
        self.entries.push(JournalEntry::Step {
            report,
            record: record.clone(),
        });
        Ok(())
    }

    fn finalize_report(&mut self, report: ReportId, end_timestamp_ms: u64) -> Result<(), PersistenceError> {
        if self.is_finalized(report) {
            return Err(PersistenceError::ReportClosed);
        }
        self.entries.push(JournalEntry::Finalized {
            report,
            end_timestamp_ms,
        });
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Backend selection
// ───────────────────────────────────────────────────────────────

pub enum JournalBackend {
    File(FileJournal),
    Memory(MemoryJournal),
}

impl JournalBackend {
    pub fn next_report_id(&self) -> ReportId {
        match self {
            Self::File(j) => j.next_report_id(),
            Self::Memory(j) => next_report_id(j.entries()),
        }
    }
}

impl PersistencePort for JournalBackend {
    fn append_step(&mut self, report: ReportId, record: &SampleRecord) -> Result<(), PersistenceError> {
        match self {
            Self::File(j) => j.append_step(report, record),
            Self::Memory(j) => j.append_step(report, record),
        }
    }

    fn finalize_report(&mut self, report: ReportId, end_timestamp_ms: u64) -> Result<(), PersistenceError> {
        match self {
            Self::File(j) => j.finalize_report(report, end_timestamp_ms),
            Self::Memory(j) => j.finalize_report(report, end_timestamp_ms),
        }
    }
}
