//! Transactional outbox and event router (§4.7): a durable queue of
//! commit-produced events, routed to one or more downstream targets under
//! a per-event-type strategy, CloudEvents-encoded on the wire.

#![warn(missing_docs)]

pub mod cloudevents;
pub mod health;
pub mod legacy;
pub mod publisher;
pub mod routing;
pub mod store;
pub mod types;

pub use cloudevents::{from_binary_headers, to_binary_headers, DecodeError};
pub use health::HealthRegistry;
pub use legacy::{normalize_legacy_event, CATCH_ALL_TYPE};
pub use publisher::{PublishTarget, Publisher, BATCH_SIZE, POLL_INTERVAL};
pub use routing::{default_rules, route, RouteStrategy, RoutingRule, Target};
pub use store::OutboxStore;
pub use types::{CloudEvent, OutboxEvent, OutboxStatus, MAX_BACKOFF_SECS, MAX_RETRY_COUNT};
