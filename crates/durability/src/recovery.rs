//! Startup replay: rebuild branch heads and the commit index from a log file.
//!
//! Grounded in the teacher's `recovery::coordinator` (read the log front to
//! back, apply each record, stop cleanly at the first torn/corrupt tail).

use crate::commit_log::CommitLogReader;
use crate::error::DurabilityError;
use crate::outbox_log::OutboxLogReader;
use crate::record::{CommitLogRecord, OutboxLogRecord};
use oms_core::{BranchName, CommitHash};
use rustc_hash::FxHashMap;
use std::path::Path;
use tracing::{info, warn};

/// Result of replaying a commit log at startup.
#[derive(Debug, Default)]
pub struct RecoveryResult {
    /// Every commit read, in log order (append order == causal order since
    /// a child commit's record is always written after its parent's).
    pub commits: Vec<CommitLogRecord>,
    /// Current HEAD commit hash per branch, after applying all commits.
    pub branch_heads: FxHashMap<BranchName, CommitHash>,
    /// Number of trailing bytes discarded because they were torn/corrupt.
    pub truncated: bool,
}

/// Replay `path` from the start, stopping at the first torn or corrupt
/// record rather than failing recovery outright — an OMS commit log is
/// append-only, so a torn tail can only be the last, not-yet-fsynced write.
pub fn replay(path: impl AsRef<Path>) -> Result<RecoveryResult, DurabilityError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(RecoveryResult::default());
    }

    let mut reader = CommitLogReader::open(path)?;
    let mut result = RecoveryResult::default();

    loop {
        match reader.next_record() {
            Ok(Some(record)) => {
                result
                    .branch_heads
                    .insert(record.branch.clone(), record.commit_hash);
                result.commits.push(record);
            }
            Ok(None) => break,
            Err(DurabilityError::Truncated(offset)) => {
                warn!(path = %path.display(), offset, "torn record at log tail, stopping replay");
                result.truncated = true;
                break;
            }
            Err(DurabilityError::CrcMismatch { offset, .. }) => {
                warn!(path = %path.display(), offset, "corrupt record at log tail, stopping replay");
                result.truncated = true;
                break;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        path = %path.display(),
        commits = result.commits.len(),
        branches = result.branch_heads.len(),
        truncated = result.truncated,
        "replayed commit log"
    );
    Ok(result)
}

/// Replay an outbox log, folding repeated snapshots of the same row id down
/// to its last-written state (each mutation re-appends the full row, so
/// "latest record per id" is exactly "current row state", the same rule
/// [`replay`] applies to commit log branch heads).
pub fn replay_outbox(path: impl AsRef<Path>) -> Result<FxHashMap<String, OutboxLogRecord>, DurabilityError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(FxHashMap::default());
    }

    let mut reader = OutboxLogReader::open(path)?;
    let mut rows: FxHashMap<String, OutboxLogRecord> = FxHashMap::default();
    let mut truncated = false;

    loop {
        match reader.next_record() {
            Ok(Some(record)) => {
                rows.insert(record.id.clone(), record);
            }
            Ok(None) => break,
            Err(DurabilityError::Truncated(offset)) => {
                warn!(path = %path.display(), offset, "torn record at outbox log tail, stopping replay");
                truncated = true;
                break;
            }
            Err(DurabilityError::CrcMismatch { offset, .. }) => {
                warn!(path = %path.display(), offset, "corrupt record at outbox log tail, stopping replay");
                truncated = true;
                break;
            }
            Err(e) => return Err(e),
        }
    }

    info!(path = %path.display(), rows = rows.len(), truncated, "replayed outbox log");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit_log::CommitLogWriter;
    use oms_core::Timestamp;

    #[test]
    fn replay_rebuilds_branch_heads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commits.log");
        let branch = BranchName::new("main").unwrap();

        {
            let mut w = CommitLogWriter::open(&path).unwrap();
            for i in 0..3 {
                let rec = CommitLogRecord {
                    commit_hash: CommitHash::of(format!("c{i}").as_bytes()),
                    parent_hash: None,
                    branch: branch.clone(),
                    author: "alice".into(),
                    message: format!("commit {i}"),
                    timestamp: Timestamp::now(),
                    changes: vec![],
                };
                w.append(&rec).unwrap();
            }
        }

        let result = replay(&path).unwrap();
        assert_eq!(result.commits.len(), 3);
        assert_eq!(
            result.branch_heads.get(&branch),
            Some(&CommitHash::of(b"c2"))
        );
        assert!(!result.truncated);
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let result = replay(dir.path().join("nope.log")).unwrap();
        assert!(result.commits.is_empty());
    }

    #[test]
    fn replay_outbox_keeps_latest_snapshot_per_id() {
        use crate::outbox_log::OutboxLogWriter;
        use crate::record::{OutboxLogRecord, OutboxRowStatus};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox.log");
        let branch = BranchName::new("main").unwrap();

        let row = |status: OutboxRowStatus, retry_count: u32| OutboxLogRecord {
            id: "evt-1".to_string(),
            event_type: "com.foundry.oms.objecttype.created".to_string(),
            branch: branch.clone(),
            commit: None,
            payload: serde_json::json!({}),
            status,
            created_at: Timestamp::now(),
            published_at: None,
            retry_count,
            next_attempt_at: Timestamp::now(),
            last_error: None,
        };

        {
            let mut w = OutboxLogWriter::open(&path).unwrap();
            w.append(&row(OutboxRowStatus::Pending, 0)).unwrap();
            w.append(&row(OutboxRowStatus::Pending, 1)).unwrap();
            w.append(&row(OutboxRowStatus::Published, 1)).unwrap();
        }

        let rows = replay_outbox(&path).unwrap();
        assert_eq!(rows.len(), 1);
        let latest = &rows["evt-1"];
        assert_eq!(latest.status, OutboxRowStatus::Published);
        assert_eq!(latest.retry_count, 1);
    }

    #[test]
    fn replay_outbox_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let rows = replay_outbox(dir.path().join("nope.log")).unwrap();
        assert!(rows.is_empty());
    }
}
