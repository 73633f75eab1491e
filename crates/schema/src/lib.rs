//! Schema Service (§4.3): ontology CRUD for the eight schema entity kinds,
//! layering cross-entity invariants on top of [`oms_store::DocumentRepository`]
//! and raising a `schema.changed` [`oms_outbox::OutboxEvent`] per mutation.

#![warn(missing_docs)]

pub mod hooks;
pub mod integrity;
pub mod invariants;
pub mod service;

pub use hooks::{HookContext, HookPipeline, ValidationHook};
pub use integrity::{check_integrity, IntegrityIssue, IntegrityReport};
pub use service::SchemaService;
