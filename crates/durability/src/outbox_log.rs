//! Append-only outbox log, mirroring [`crate::commit_log`]'s writer/reader
//! shape but for [`OutboxLogRecord`]s keyed by event id rather than branch.

use crate::error::DurabilityError;
use crate::record::{LogHeader, OutboxLogRecord, LOG_HEADER_SIZE, OUTBOX_LOG_MAGIC};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Append-only writer for an outbox log file.
pub struct OutboxLogWriter {
    path: PathBuf,
    file: BufWriter<File>,
    offset: u64,
}

impl OutboxLogWriter {
    /// Open (creating if absent) the outbox log at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DurabilityError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let existed = path.exists();
        let mut file = OpenOptions::new().create(true).read(true).append(true).open(&path)?;

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

        info!(path = %path.display(), existed, "opened outbox log");
        Ok(OutboxLogWriter {
            path,
            file: BufWriter::new(file),
            offset,
        })
    }

    fn write_header(file: &mut File) -> Result<u64, DurabilityError> {
        let header = LogHeader::new(OUTBOX_LOG_MAGIC, *uuid::Uuid::new_v4().as_bytes());
        file.write_all(&header.to_bytes())?;
        file.sync_all()?;
        Ok(LOG_HEADER_SIZE as u64)
    }

    /// Append one outbox row snapshot, fsync, and return its byte offset.
    pub fn append(&mut self, record: &OutboxLogRecord) -> Result<u64, DurabilityError> {
        let start = self.offset;
        let written = record.write_to(&mut self.file)?;
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        self.offset += written;
        debug!(id = %record.id, offset = start, "appended outbox record");
        Ok(start)
    }

    /// Path to the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Sequential reader over an outbox log file, used for startup replay.
pub struct OutboxLogReader {
    reader: BufReader<File>,
    offset: u64,
}

impl OutboxLogReader {
    /// Open an existing outbox log for reading, validating its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DurabilityError> {
        let mut file = File::open(path)?;
        let mut header_bytes = [0u8; LOG_HEADER_SIZE];
        file.read_exact(&mut header_bytes)?;
        LogHeader::from_bytes(&header_bytes, OUTBOX_LOG_MAGIC)?;
        file.seek(SeekFrom::Start(LOG_HEADER_SIZE as u64))?;
        Ok(OutboxLogReader {
            reader: BufReader::new(file),
            offset: LOG_HEADER_SIZE as u64,
        })
    }

    /// Read the next record, or `None` at clean end-of-file.
    ///
    /// As with [`crate::commit_log::CommitLogReader`], a truncation or CRC
    /// error marks a torn tail from an unclean shutdown; callers should stop
    /// replay there.
    pub fn next_record(&mut self) -> Result<Option<OutboxLogRecord>, DurabilityError> {
        match OutboxLogRecord::read_from(&mut self.reader, self.offset)? {
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
    use crate::record::OutboxRowStatus;
    use oms_core::{BranchName, Timestamp};

    fn sample(id: &str, status: OutboxRowStatus) -> OutboxLogRecord {
        OutboxLogRecord {
            id: id.to_string(),
            event_type: "com.foundry.oms.objecttype.created".to_string(),
            branch: BranchName::new("main").unwrap(),
            commit: None,
            payload: serde_json::json!({}),
            status,
            created_at: Timestamp::now(),
            published_at: None,
            retry_count: 0,
            next_attempt_at: Timestamp::now(),
            last_error: None,
        }
    }

    #[test]
    fn round_trips_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox.log");

        {
            let mut w = OutboxLogWriter::open(&path).unwrap();
            w.append(&sample("evt-1", OutboxRowStatus::Pending)).unwrap();
            w.append(&sample("evt-2", OutboxRowStatus::Pending)).unwrap();
        }

        let mut r = OutboxLogReader::open(&path).unwrap();
        let a = r.next_record().unwrap().unwrap();
        let b = r.next_record().unwrap().unwrap();
        assert_eq!(a.id, "evt-1");
        assert_eq!(b.id, "evt-2");
        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn rejects_a_commit_log_opened_as_an_outbox_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commits.log");
        {
            let mut w = crate::commit_log::CommitLogWriter::open(&path).unwrap();
            w.append(&crate::record::CommitLogRecord {
                commit_hash: oms_core::CommitHash::of(b"x"),
                parent_hash: None,
                branch: BranchName::new("main").unwrap(),
                author: "alice".into(),
                message: "m".into(),
                timestamp: Timestamp::now(),
                changes: vec![],
            })
            .unwrap();
        }

        let err = OutboxLogReader::open(&path).unwrap_err();
        assert!(matches!(err, DurabilityError::BadMagic));
    }
}
