//! Commit log record and file-header framing.
//!
//! Grounded in the teacher's `durability::format::wal_record` segment/record
//! layout: a fixed-size header followed by length-prefixed, CRC32-checked
//! records. OMS writes one record per committed [`oms-store`] commit rather
//! than per-mutation WAL entries — a commit is already the durability unit
//! (§4.1), so there's no separate begin/commit marker protocol to replicate.
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │ Log Header (32 bytes)              │
//! ├────────────────────────────────────┤
//! │ Record 1: len(4) ver(1) payload crc(4) │
//! ├────────────────────────────────────┤
//! │ Record 2 ...                       │
//! └────────────────────────────────────┘
//! ```

use crate::error::DurabilityError;
use crate::frame::{read_record, write_record};
use oms_core::{BranchName, ChangeRecord, CommitHash, Timestamp};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Magic bytes identifying an OMS commit log file.
pub const LOG_MAGIC: [u8; 4] = *b"OMSC";

/// Magic bytes identifying an OMS outbox log file.
pub const OUTBOX_LOG_MAGIC: [u8; 4] = *b"OMSO";

/// Current on-disk format version.
pub const LOG_FORMAT_VERSION: u32 = 1;

/// Size of the fixed log header, in bytes.
pub const LOG_HEADER_SIZE: usize = 32;

/// Fixed header written once at the start of a log file. Shared by the
/// commit log and the outbox log; `magic` distinguishes which is which so
/// one can't accidentally be opened as the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogHeader {
    /// Which log this is (`LOG_MAGIC` or `OUTBOX_LOG_MAGIC`).
    pub magic: [u8; 4],
    /// Format version.
    pub format_version: u32,
    /// Store instance this log belongs to, for cross-file integrity checks.
    pub instance_id: [u8; 16],
}

impl LogHeader {
    /// Build a header for a freshly created log.
    pub fn new(magic: [u8; 4], instance_id: [u8; 16]) -> Self {
        LogHeader {
            magic,
            format_version: LOG_FORMAT_VERSION,
            instance_id,
        }
    }

    /// Serialize to the fixed 32-byte layout.
    pub fn to_bytes(&self) -> [u8; LOG_HEADER_SIZE] {
        let mut bytes = [0u8; LOG_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.format_version.to_le_bytes());
        bytes[8..24].copy_from_slice(&self.instance_id);
        bytes
    }

    /// Parse from bytes, validating against `expected_magic`.
    pub fn from_bytes(bytes: &[u8; LOG_HEADER_SIZE], expected_magic: [u8; 4]) -> Result<Self, DurabilityError> {
        if bytes[0..4] != expected_magic {
            return Err(DurabilityError::BadMagic);
        }
        let format_version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        if format_version > LOG_FORMAT_VERSION {
            return Err(DurabilityError::UnsupportedVersion(format_version));
        }
        let mut instance_id = [0u8; 16];
        instance_id.copy_from_slice(&bytes[8..24]);
        Ok(LogHeader {
            magic: expected_magic,
            format_version,
            instance_id,
        })
    }
}

/// One committed commit, as persisted in the log (§4.1's Commit object).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitLogRecord {
    /// This commit's content-addressed hash.
    pub commit_hash: CommitHash,
    /// Parent commit, or `None` for a branch's first commit.
    pub parent_hash: Option<CommitHash>,
    /// Branch this commit was written to.
    pub branch: BranchName,
    /// Author identity.
    pub author: String,
    /// Commit message.
    pub message: String,
    /// When the commit was created.
    pub timestamp: Timestamp,
    /// The entity-level mutations in this commit.
    pub changes: Vec<ChangeRecord>,
}

impl CommitLogRecord {
    /// Encode `len(4) | format_version(1) | payload | crc32(4)` and write it.
    ///
    /// Returns the number of bytes written.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<u64, DurabilityError> {
        write_record(w, self)
    }

    /// Read one record at `offset`. Returns `None` at clean end-of-file.
    pub fn read_from<R: Read>(r: &mut R, offset: u64) -> Result<Option<(Self, u64)>, DurabilityError> {
        read_record(r, offset)
    }
}

/// Delivery state of an outbox row, mirrored from `oms-outbox::OutboxStatus`
/// so this crate doesn't need to depend on it — the same reason
/// [`CommitLogRecord`] mirrors `oms-store`'s `Commit` instead of importing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxRowStatus {
    /// Not yet claimed by a publisher.
    Pending,
    /// Delivered to at least the targets its routing strategy required.
    Published,
    /// Exceeded the retry cap without a qualifying delivery.
    Failed,
}

/// One outbox row, as persisted (§3 "OutboxEvent"). A full snapshot is
/// appended on every state change (insert, publish, retry) rather than a
/// delta; replay keeps only the latest record per `id`, the same
/// last-write-wins rule [`crate::recovery::replay`] applies to branch heads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxLogRecord {
    /// Row id (mirrors the CloudEvents `id` and bus dedup header).
    pub id: String,
    /// Reverse-DNS event type.
    pub event_type: String,
    /// Branch the originating commit landed on.
    pub branch: BranchName,
    /// Commit that produced this event, if any.
    pub commit: Option<CommitHash>,
    /// Event body.
    pub payload: serde_json::Value,
    /// Delivery state.
    pub status: OutboxRowStatus,
    /// When the row was inserted.
    pub created_at: Timestamp,
    /// When it was marked published, if ever.
    pub published_at: Option<Timestamp>,
    /// Number of delivery attempts made so far.
    pub retry_count: u32,
    /// Earliest time the publisher should attempt this row again.
    pub next_attempt_at: Timestamp,
    /// Error from the most recent failed attempt.
    pub last_error: Option<String>,
}

impl OutboxLogRecord {
    /// Encode and write, sharing [`CommitLogRecord`]'s framing.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<u64, DurabilityError> {
        write_record(w, self)
    }

    /// Read one record at `offset`. Returns `None` at clean end-of-file.
    pub fn read_from<R: Read>(r: &mut R, offset: u64) -> Result<Option<(Self, u64)>, DurabilityError> {
        read_record(r, offset)
    }
}
