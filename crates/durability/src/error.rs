//! Errors from the on-disk commit log.

use thiserror::Error;

/// Failures reading or writing the commit log.
#[derive(Debug, Error)]
pub enum DurabilityError {
    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Header magic bytes didn't match [`crate::record::LOG_MAGIC`].
    #[error("bad magic bytes in commit log header")]
    BadMagic,

    /// Header format version is newer than this build understands.
    #[error("unsupported commit log format version: {0}")]
    UnsupportedVersion(u32),

    /// A record's CRC32 did not match its payload.
    #[error("crc mismatch in record at offset {offset}: stored {stored:08x}, computed {computed:08x}")]
    CrcMismatch {
        /// Byte offset of the record within the log.
        offset: u64,
        /// CRC stored in the record trailer.
        stored: u32,
        /// CRC recomputed from the payload.
        computed: u32,
    },

    /// Record was truncated (e.g. a crash mid-write); everything before it
    /// is still valid and replay stops here.
    #[error("truncated record at offset {0}")]
    Truncated(u64),

    /// Payload failed to deserialize as a [`crate::record::CommitLogRecord`].
    #[error("corrupt record payload: {0}")]
    Corrupt(#[from] serde_json::Error),
}
