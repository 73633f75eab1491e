//! The outbox table itself (§4.7: "select pending ... mark published ... increment retry").
//!
//! Grounded in the same `DashMap`-of-rows shape `oms-branch::ProposalStore`
//! uses for auxiliary, non-versioned state, backed by an append-only log the
//! way `oms-store::VersionStore` backs its in-memory commit graph with
//! `oms-durability`'s commit log (§6 persistent `outbox` table).

use dashmap::DashMap;
use oms_core::{OmsError, OmsResult, Timestamp};
use oms_durability::{DurabilityError, OutboxLogRecord, OutboxLogWriter};
use parking_lot::Mutex;
use std::path::Path;
use tracing::error;

use crate::types::{OutboxEvent, OutboxStatus, MAX_BACKOFF_SECS, MAX_RETRY_COUNT};

/// The transactional outbox: a queue of events awaiting publication, durable
/// when opened with [`OutboxStore::with_log`], in-process-only otherwise
/// (tests, and callers that don't need to survive a restart).
#[derive(Default)]
pub struct OutboxStore {
    rows: DashMap<String, OutboxEvent>,
    log: Option<Mutex<OutboxLogWriter>>,
}

impl OutboxStore {
    /// An in-memory-only outbox (no restart durability). Used by tests and
    /// by any caller that doesn't pass a log path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or create) a durable outbox log at `path`, replaying whatever
    /// rows it already holds before accepting new writes — a crash between
    /// "commit landed" and "outbox row written" must not lose the row, and a
    /// crash after must not forget a row was ever pending (§1 at-least-once
    /// delivery).
    pub fn with_log(path: impl AsRef<Path>) -> Result<Self, DurabilityError> {
        let rows = DashMap::new();
        for (id, record) in oms_durability::replay_outbox(&path)? {
            rows.insert(id, OutboxEvent::from(record));
        }
        let writer = OutboxLogWriter::open(path)?;
        Ok(OutboxStore {
            rows,
            log: Some(Mutex::new(writer)),
        })
    }

    fn persist(&self, event: &OutboxEvent) -> OmsResult<()> {
        if let Some(log) = &self.log {
            let record = OutboxLogRecord::from(event);
            log.lock().append(&record).map_err(|e| OmsError::Fatal(e.to_string()))?;
        }
        Ok(())
    }

    /// Insert a new row, durably if this store was opened with a log. Part
    /// of the same commit unit as the business mutation via
    /// `oms_store::Tx::commit_with_outbox` — a failure here must propagate
    /// and fail that commit (§8 "Outbox exactly-one-per-commit").
    pub fn insert(&self, event: OutboxEvent) -> OmsResult<()> {
        self.persist(&event)?;
        self.rows.insert(event.id.clone(), event);
        Ok(())
    }

    /// Claim up to `limit` pending rows whose `next_attempt_at` has arrived,
    /// oldest first (§4.7 publisher loop step 1).
    pub fn select_pending(&self, limit: usize) -> Vec<OutboxEvent> {
        let now = Timestamp::now();
        let mut pending: Vec<OutboxEvent> = self
            .rows
            .iter()
            .map(|r| r.value().clone())
            .filter(|e| e.status == OutboxStatus::Pending && e.next_attempt_at <= now)
            .collect();
        pending.sort_by_key(|e| e.created_at);
        pending.truncate(limit);
        pending
    }

    /// Mark a row delivered. Publish failures are never surfaced to the
    /// writer (§7 policy), so a durability write failure here is logged, not
    /// propagated — worst case the row is redelivered on restart, which
    /// at-least-once delivery already tolerates.
    pub fn mark_published(&self, id: &str) {
        if let Some(mut row) = self.rows.get_mut(id) {
            row.status = OutboxStatus::Published;
            row.published_at = Some(Timestamp::now());
            if let Err(e) = self.persist(&*row) {
                error!(id, error = %e, "failed to persist outbox publish state");
            }
        }
    }

    /// Record a failed delivery attempt, scheduling the next one with
    /// exponential backoff, or transitioning to `failed` past the retry cap
    /// (§4.7: `next_attempt_at = now + min(2^retry_count, 300)s`).
    pub fn increment_retry(&self, id: &str, message: impl Into<String>) {
        if let Some(mut row) = self.rows.get_mut(id) {
            row.retry_count += 1;
            row.last_error = Some(message.into());
            if row.retry_count >= MAX_RETRY_COUNT {
                row.status = OutboxStatus::Failed;
            } else {
                let backoff_secs = 2i64.saturating_pow(row.retry_count).min(MAX_BACKOFF_SECS);
                row.next_attempt_at = Timestamp::from_datetime(
                    Timestamp::now().as_datetime() + chrono::Duration::seconds(backoff_secs),
                );
            }
            if let Err(e) = self.persist(&*row) {
                error!(id, error = %e, "failed to persist outbox retry state");
            }
        }
    }

    /// Fetch a row by id (tests, diagnostics).
    pub fn get(&self, id: &str) -> Option<OutboxEvent> {
        self.rows.get(id).map(|r| r.value().clone())
    }

    /// Total rows currently `pending` — the §4.7 backpressure signal.
    pub fn pending_count(&self) -> usize {
        self.rows.iter().filter(|r| r.status == OutboxStatus::Pending).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oms_core::BranchName;
    use serde_json::json;

    fn event() -> OutboxEvent {
        OutboxEvent::new(
            "com.foundry.oms.objecttype.created",
            BranchName::new("main").unwrap(),
            None,
            json!({"resource_id": "Asset"}),
        )
    }

    #[test]
    fn select_pending_returns_new_rows() {
        let store = OutboxStore::new();
        store.insert(event()).unwrap();
        assert_eq!(store.select_pending(10).len(), 1);
    }

    #[test]
    fn mark_published_removes_from_pending() {
        let store = OutboxStore::new();
        let e = event();
        let id = e.id.clone();
        store.insert(e).unwrap();
        store.mark_published(&id);
        assert!(store.select_pending(10).is_empty());
        assert_eq!(store.get(&id).unwrap().status, OutboxStatus::Published);
    }

    #[test]
    fn retry_cap_marks_failed() {
        let store = OutboxStore::new();
        let e = event();
        let id = e.id.clone();
        store.insert(e).unwrap();
        for _ in 0..MAX_RETRY_COUNT {
            store.increment_retry(&id, "boom");
        }
        assert_eq!(store.get(&id).unwrap().status, OutboxStatus::Failed);
    }

    #[test]
    fn retry_schedules_future_attempt() {
        let store = OutboxStore::new();
        let e = event();
        let id = e.id.clone();
        store.insert(e).unwrap();
        store.increment_retry(&id, "boom");
        let row = store.get(&id).unwrap();
        assert!(row.next_attempt_at > row.created_at);
        assert!(store.select_pending(10).is_empty());
    }

    #[test]
    fn with_log_survives_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox.log");
        let id;
        {
            let store = OutboxStore::with_log(&path).unwrap();
            let e = event();
            id = e.id.clone();
            store.insert(e).unwrap();
            store.mark_published(&id);
        }

        let reopened = OutboxStore::with_log(&path).unwrap();
        assert_eq!(reopened.get(&id).unwrap().status, OutboxStatus::Published);
    }
}
