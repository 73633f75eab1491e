//! Outbox row and CloudEvent wire model (§4.7, §3 "OutboxEvent"/"CloudEvent").

use oms_core::{BranchName, CommitHash, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Delivery state of an [`OutboxEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Not yet claimed by a publisher.
    Pending,
    /// Delivered to at least the targets its routing strategy required.
    Published,
    /// Exceeded the retry cap (§4.7: default 10) without a qualifying delivery.
    Failed,
}

/// A row in the transactional outbox (§3 "OutboxEvent").
///
/// Invariant: exactly one row is inserted per business mutation that should
/// raise an event, at the time the mutation's commit is produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    /// Unique id; doubles as the CloudEvents `id` and the bus dedup header.
    pub id: String,
    /// Reverse-DNS event type, e.g. `com.foundry.oms.objecttype.created`.
    pub event_type: String,
    /// Branch the originating commit landed on.
    pub branch: BranchName,
    /// Commit that produced this event, if any (system events may have none).
    pub commit: Option<CommitHash>,
    /// Event body.
    pub payload: Json,
    /// Delivery state.
    pub status: OutboxStatus,
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

impl OutboxEvent {
    /// Build a new, unclaimed row (§4.7).
    pub fn new(event_type: impl Into<String>, branch: BranchName, commit: Option<CommitHash>, payload: Json) -> Self {
        let now = Timestamp::now();
        OutboxEvent {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            branch,
            commit,
            payload,
            status: OutboxStatus::Pending,
            created_at: now,
            published_at: None,
            retry_count: 0,
            next_attempt_at: now,
            last_error: None,
        }
    }
}

impl From<&OutboxEvent> for oms_durability::OutboxLogRecord {
    fn from(event: &OutboxEvent) -> Self {
        oms_durability::OutboxLogRecord {
            id: event.id.clone(),
            event_type: event.event_type.clone(),
            branch: event.branch.clone(),
            commit: event.commit,
            payload: event.payload.clone(),
            status: match event.status {
                OutboxStatus::Pending => oms_durability::OutboxRowStatus::Pending,
                OutboxStatus::Published => oms_durability::OutboxRowStatus::Published,
                OutboxStatus::Failed => oms_durability::OutboxRowStatus::Failed,
            },
            created_at: event.created_at,
            published_at: event.published_at,
            retry_count: event.retry_count,
            next_attempt_at: event.next_attempt_at,
            last_error: event.last_error.clone(),
        }
    }
}

impl From<oms_durability::OutboxLogRecord> for OutboxEvent {
    fn from(record: oms_durability::OutboxLogRecord) -> Self {
        OutboxEvent {
            id: record.id,
            event_type: record.event_type,
            branch: record.branch,
            commit: record.commit,
            payload: record.payload,
            status: match record.status {
                oms_durability::OutboxRowStatus::Pending => OutboxStatus::Pending,
                oms_durability::OutboxRowStatus::Published => OutboxStatus::Published,
                oms_durability::OutboxRowStatus::Failed => OutboxStatus::Failed,
            },
            created_at: record.created_at,
            published_at: record.published_at,
            retry_count: record.retry_count,
            next_attempt_at: record.next_attempt_at,
            last_error: record.last_error,
        }
    }
}

/// Maximum retry attempts before a row is marked `failed` (§4.7: "default 10").
pub const MAX_RETRY_COUNT: u32 = 10;

/// Backoff cap in seconds (§4.7: `min(2^retry_count, 300)`).
pub const MAX_BACKOFF_SECS: i64 = 300;

/// A CloudEvents 1.0 envelope (§3 "CloudEvent (wire)").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudEvent {
    /// Always `"1.0"`.
    pub specversion: &'static str,
    /// Reverse-DNS type, e.g. `com.foundry.oms.objecttype.created`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Producer URI, e.g. `urn:oms:schema-service`.
    pub source: String,
    /// Unique id (mirrors the outbox row id).
    pub id: String,
    /// RFC3339 timestamp.
    pub time: String,
    /// Always `application/json`.
    pub datacontenttype: &'static str,
    /// Routing subject, if derived (§4.7).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Event body.
    pub data: Json,
    /// Correlation id extension.
    #[serde(rename = "ce_correlationid", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Causation id extension.
    #[serde(rename = "ce_causationid", skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,
    /// Branch extension.
    #[serde(rename = "ce_branch", skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Commit extension.
    #[serde(rename = "ce_commit", skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// Author extension.
    #[serde(rename = "ce_author", skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Tenant extension.
    #[serde(rename = "ce_tenant", skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    /// Distributed-tracing extensions.
    #[serde(rename = "ce_traceparent", skip_serializing_if = "Option::is_none")]
    pub traceparent: Option<String>,
    /// Distributed-tracing span extension.
    #[serde(rename = "ce_spanid", skip_serializing_if = "Option::is_none")]
    pub spanid: Option<String>,
    /// Monotonic per-source sequence number extension.
    #[serde(rename = "ce_sequencenumber", skip_serializing_if = "Option::is_none")]
    pub sequencenumber: Option<String>,
}

impl CloudEvent {
    /// Build a minimal CloudEvent from an [`OutboxEvent`] row.
    pub fn from_outbox_event(event: &OutboxEvent, source: impl Into<String>, author: Option<String>) -> Self {
        CloudEvent {
            specversion: "1.0",
            event_type: event.event_type.clone(),
            source: source.into(),
            id: event.id.clone(),
            time: event.created_at.to_rfc3339(),
            datacontenttype: "application/json",
            subject: None,
            data: event.payload.clone(),
            correlation_id: None,
            causation_id: None,
            branch: Some(event.branch.as_str().to_string()),
            commit: event.commit.map(|c| c.to_string()),
            author,
            tenant: None,
            traceparent: None,
            spanid: None,
            sequencenumber: None,
        }
    }
}
