//! On-disk commit log for OMS (§4.1's Commit durability point).
//!
//! Everything that touches disk lives here: segment/record framing, the
//! append-only writer, and startup replay. `oms-store` owns the in-memory
//! commit graph and calls into this crate only to make a commit durable and
//! to rebuild state after a restart.

#![warn(missing_docs)]

pub mod commit_log;
pub mod error;
pub mod frame;
pub mod outbox_log;
pub mod record;
pub mod recovery;

pub use commit_log::{CommitLogReader, CommitLogWriter};
pub use error::DurabilityError;
pub use outbox_log::{OutboxLogReader, OutboxLogWriter};
pub use record::{
    CommitLogRecord, LogHeader, OutboxLogRecord, OutboxRowStatus, LOG_FORMAT_VERSION, LOG_MAGIC, OUTBOX_LOG_MAGIC,
};
pub use recovery::{replay, replay_outbox, RecoveryResult};
