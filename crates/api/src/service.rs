//! Facade wiring every component (C1-C9) into one entry point, the way
//! `strata-api`'s `SubstrateImpl` wires the engine's primitives together
//! over a single shared store.

use std::collections::BTreeMap;
use std::sync::Arc;

use oms_branch::BranchService;
use oms_cache::{Cache, CacheConfig};
use oms_core::{BranchName, Document, EntityKind, Limits, OmsResult};
use oms_schema::{IntegrityReport, SchemaService};
use oms_store::VersionStore;
use oms_timetravel::TimeTravelEngine;
use oms_validator::schema::{ObjectTypeSchema, SharedPropertySchema, ValidationContext};
use oms_validator::{RecordCounter, ValidationEngine, ValidationRequest, ValidationResult};

/// The branch every store is seeded with (§2: "trunk").
pub const MAIN_BRANCH: &str = "main";

/// Everything needed to stand up an embedded OMS instance: one shared
/// [`VersionStore`] plus a service per component, wired the way `main`
/// would wire them in a real deployment.
pub struct OntologyService {
    store: Arc<VersionStore>,
    schema: SchemaService,
    branch: BranchService,
    outbox: Arc<oms_outbox::OutboxStore>,
    validator: ValidationEngine,
    timetravel: TimeTravelEngine,
}

impl OntologyService {
    /// Build a fresh, empty, non-durable instance with `main` already
    /// created (tests, or a cache-only deployment).
    pub fn new(limits: Limits, cache_config: CacheConfig) -> OmsResult<Self> {
        Self::from_store(VersionStore::in_memory(), oms_outbox::OutboxStore::new(), limits, cache_config)
    }

    /// Open (or create) a durable instance backed by a commit log on disk,
    /// ensuring `main` exists (`oms-cli` runs this once per invocation). The
    /// outbox is made durable alongside it, in a sibling `<path>.outbox`
    /// file (§6 persistent `outbox` table).
    pub fn open(path: impl Into<std::path::PathBuf>, limits: Limits, cache_config: CacheConfig) -> OmsResult<Self> {
        let path = path.into();
        let mut outbox_path = path.clone().into_os_string();
        outbox_path.push(".outbox");
        let outbox = oms_outbox::OutboxStore::with_log(outbox_path)
            .map_err(|e| oms_core::OmsError::Fatal(e.to_string()))?;
        Self::from_store(VersionStore::open(path)?, outbox, limits, cache_config)
    }

    fn from_store(
        store: Arc<VersionStore>,
        outbox: oms_outbox::OutboxStore,
        limits: Limits,
        cache_config: CacheConfig,
    ) -> OmsResult<Self> {
        let branch = BranchService::new(store.clone());
        let main = BranchName::new_unchecked(MAIN_BRANCH);
        if branch.get_branch(&main, "system").is_err() {
            branch.create_branch(&main, None, "system")?;
        }

        let outbox = Arc::new(outbox);
        let schema = SchemaService::new(store.clone(), outbox.clone(), limits);
        let cache = Arc::new(Cache::new(cache_config));
        let timetravel = TimeTravelEngine::new(store.clone(), cache);

        Ok(OntologyService {
            store,
            schema,
            branch,
            outbox,
            validator: ValidationEngine::new(),
            timetravel,
        })
    }

    /// The underlying store, for callers that need direct diagnostic access
    /// (`oms-cli`'s `show-commit`/`diff`).
    pub fn store(&self) -> &Arc<VersionStore> {
        &self.store
    }

    /// The schema service, for typed CRUD (§4.3).
    pub fn schema(&self) -> &SchemaService {
        &self.schema
    }

    /// The branch service, for lifecycle and merge operations (§4.6).
    pub fn branch(&self) -> &BranchService {
        &self.branch
    }

    /// The time-travel engine, for point-in-time and range queries (§4.8).
    pub fn timetravel(&self) -> &TimeTravelEngine {
        &self.timetravel
    }

    /// Pending rows in the transactional outbox (§4.7), for operator
    /// inspection. Draining them onto real publish targets is out of scope
    /// for this embedded facade — see `oms-outbox::Publisher`.
    pub fn pending_outbox_count(&self) -> usize {
        self.outbox.pending_count()
    }

    /// Run the breaking-change validator between two branches' current
    /// schema state (§4.5).
    pub fn validate(&self, request: ValidationRequest) -> OmsResult<ValidationResult> {
        let source = BranchName::new(request.source_branch.clone())
            .map_err(|e| oms_core::OmsError::invalid_field("source_branch", e.to_string()))?;
        let target = BranchName::new(request.target_branch.clone())
            .map_err(|e| oms_core::OmsError::invalid_field("target_branch", e.to_string()))?;

        let (source_object_types, source_shared_properties) = self.schema_snapshot(&source);
        let (target_object_types, target_shared_properties) = self.schema_snapshot(&target);

        let ctx = ValidationContext {
            target_object_types: &target_object_types,
            source_object_types: &source_object_types,
            target_shared_properties: &target_shared_properties,
            source_shared_properties: &source_shared_properties,
        };
        let counter = StoreRecordCounter { store: self.store.clone() };
        Ok(self.validator.validate(&request, &ctx, &counter))
    }

    /// Graph-health scan over a branch (§9C).
    pub fn check_integrity(&self, branch: &BranchName) -> IntegrityReport {
        self.schema.check_integrity(branch)
    }

    fn schema_snapshot(&self, branch: &BranchName) -> (ObjectTypeSchema, SharedPropertySchema) {
        let mut object_types = BTreeMap::new();
        let mut shared_properties = BTreeMap::new();
        for (key, doc) in self.store.current_documents(branch) {
            match key.kind {
                EntityKind::ObjectType => {
                    object_types.insert(key.id, doc.content);
                }
                EntityKind::SharedProperty => {
                    shared_properties.insert(key.id, doc.content);
                }
                _ => {}
            }
        }
        (object_types, shared_properties)
    }
}

/// [`RecordCounter`] backed directly by the shared store: a document of
/// `resource_name`/`resource_type` counts as one affected record if it
/// exists and is not tombstoned (§4.5's `DataImpactAnalyzer` has no
/// separate instance-data layer to count against in this rewrite).
struct StoreRecordCounter {
    store: Arc<VersionStore>,
}

impl RecordCounter for StoreRecordCounter {
    fn count_records(&self, branch: &str, resource_type: &str, resource_name: &str) -> u64 {
        let Ok(branch) = BranchName::new(branch) else {
            return 0;
        };
        let Some(kind) = EntityKind::ALL.into_iter().find(|k| k.as_str().eq_ignore_ascii_case(resource_type)) else {
            return 0;
        };
        let key = oms_core::DocumentKey::new(kind, resource_name, branch);
        u64::from(self.store.get_commit_or_current(&key).is_some())
    }
}

trait CurrentDocumentLookup {
    fn get_commit_or_current(&self, key: &oms_core::DocumentKey) -> Option<Document>;
}

impl CurrentDocumentLookup for VersionStore {
    fn get_commit_or_current(&self, key: &oms_core::DocumentKey) -> Option<Document> {
        self.current_documents(&key.branch).get(key).cloned()
    }
}
