//! # OMS
//!
//! Version-controlled ontology metadata repository: branch-isolated schema
//! CRUD, three-way merge, breaking-change validation, a transactional
//! outbox with multi-platform event fan-out, and a time-travel query engine
//! over an append-only commit store.
//!
//! # Quick Start
//!
//! ```no_run
//! use oms_api::{OntologyService, MAIN_BRANCH};
//! use oms_cache::CacheConfig;
//! use oms_core::{BranchName, EntityKind, Limits};
//! use serde_json::json;
//!
//! let service = OntologyService::new(Limits::default(), CacheConfig::default())?;
//! let main = BranchName::new_unchecked(MAIN_BRANCH);
//! service.schema().create(
//!     EntityKind::ObjectType,
//!     main,
//!     "Asset",
//!     json!({"name": "Asset", "display_name": "Asset", "type_class": "object", "status": "active", "properties": []}),
//!     "alice",
//! )?;
//! # Ok::<(), oms_core::OmsError>(())
//! ```
//!
//! # Architecture
//!
//! [`OntologyService`](oms_api::OntologyService) is the facade entry point;
//! it wires one shared `oms_store::VersionStore` to a service per component
//! (Schema, Branch, Validator, Outbox, Cache, Time-Travel). Each component
//! lives in its own crate and can be used standalone by a caller that only
//! needs, say, the merge engine or the breaking-change validator.

pub use oms_api::*;
