//! Append-only commit log writer/reader, built on [`crate::record`]'s framing.
//!
//! One file per store instance. Grounded in the teacher's `WalWriter`
//! (`durability::wal_writer`): buffered append-mode file handle, fsync on
//! every durable write (§7 treats a commit ack as a durability promise, so
//! OMS always runs the equivalent of the teacher's `DurabilityMode::Strict`).

use crate::error::DurabilityError;
use crate::record::{CommitLogRecord, LogHeader, LOG_HEADER_SIZE, LOG_MAGIC};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Append-only writer for a branch's commit log file.
pub struct CommitLogWriter {
    path: PathBuf,
    file: BufWriter<File>,
    offset: u64,
}

impl CommitLogWriter {
    /// Open (creating if absent) the commit log at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DurabilityError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let existed = path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let offset = if existed {
            let len = file.metadata()?.len();
            if len == 0 {
                Self::write_header(&mut file)?
            } else {
                len
            }
        } else {
            Self::write_header(&mut file)?
        };

        info!(path = %path.display(), existed, "opened commit log");
        Ok(CommitLogWriter {
            path,
            file: BufWriter::new(file),
            offset,
        })
    }

    fn write_header(file: &mut File) -> Result<u64, DurabilityError> {
        let header = LogHeader::new(LOG_MAGIC, *uuid::Uuid::new_v4().as_bytes());
        file.write_all(&header.to_bytes())?;
        file.sync_all()?;
        Ok(LOG_HEADER_SIZE as u64)
    }

    /// Append one commit record, fsync, and return its byte offset.
    pub fn append(&mut self, record: &CommitLogRecord) -> Result<u64, DurabilityError> {
        let start = self.offset;
        let written = record.write_to(&mut self.file)?;
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        self.offset += written;
        debug!(commit_hash = %record.commit_hash, offset = start, "appended commit record");
        Ok(start)
    }

    /// Path to the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Sequential reader over a commit log file, used for startup replay.
pub struct CommitLogReader {
    reader: BufReader<File>,
    offset: u64,
}

impl CommitLogReader {
    /// Open an existing commit log for reading, validating its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DurabilityError> {
        let mut file = File::open(path)?;
        let mut header_bytes = [0u8; LOG_HEADER_SIZE];
        file.read_exact(&mut header_bytes)?;
        LogHeader::from_bytes(&header_bytes, LOG_MAGIC)?;
        file.seek(SeekFrom::Start(LOG_HEADER_SIZE as u64))?;
        Ok(CommitLogReader {
            reader: BufReader::new(file),
            offset: LOG_HEADER_SIZE as u64,
        })
    }

    /// Read the next record, or `None` at clean end-of-file.
    ///
    /// A [`DurabilityError::Truncated`] or [`DurabilityError::CrcMismatch`]
    /// indicates a torn write from an unclean shutdown; callers should stop
    /// replay there and treat everything read so far as the durable prefix.
    pub fn next_record(&mut self) -> Result<Option<CommitLogRecord>, DurabilityError> {
        match CommitLogRecord::read_from(&mut self.reader, self.offset)? {
            Some((record, consumed)) => {
                self.offset += consumed;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oms_core::{BranchName, CommitHash, Timestamp};

    fn sample(msg: &str) -> CommitLogRecord {
        CommitLogRecord {
            commit_hash: CommitHash::of(msg.as_bytes()),
            parent_hash: None,
            branch: BranchName::new("main").unwrap(),
            author: "alice".into(),
            message: msg.into(),
            timestamp: Timestamp::now(),
            changes: vec![],
        }
    }

    #[test]
    fn round_trips_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commits.log");

        {
            let mut w = CommitLogWriter::open(&path).unwrap();
            w.append(&sample("first")).unwrap();
            w.append(&sample("second")).unwrap();
        }

        let mut r = CommitLogReader::open(&path).unwrap();
        let a = r.next_record().unwrap().unwrap();
        let b = r.next_record().unwrap().unwrap();
        assert_eq!(a.message, "first");
        assert_eq!(b.message, "second");
        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commits.log");
        {
            let mut w = CommitLogWriter::open(&path).unwrap();
            w.append(&sample("first")).unwrap();
        }

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        let mut r = CommitLogReader::open(&path).unwrap();
        let err = r.next_record().unwrap_err();
        assert!(matches!(err, DurabilityError::CrcMismatch { .. }));
    }

    #[test]
    fn reopening_resumes_append_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commits.log");
        {
            let mut w = CommitLogWriter::open(&path).unwrap();
            w.append(&sample("first")).unwrap();
        }
        {
            let mut w = CommitLogWriter::open(&path).unwrap();
            w.append(&sample("second")).unwrap();
        }

        let mut r = CommitLogReader::open(&path).unwrap();
        let a = r.next_record().unwrap().unwrap();
        let b = r.next_record().unwrap().unwrap();
        assert_eq!(a.message, "first");
        assert_eq!(b.message, "second");
    }
}
