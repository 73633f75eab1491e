//! Result and request types for the Breaking-Change Validator (§4.5).

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// Severity of a detected breaking change. Declared low-to-high so the
/// derived `Ord` gives `Critical > High > Medium > Low` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Informational only; does not block a merge.
    Low,
    /// Worth a reviewer's attention but not blocking.
    Medium,
    /// Blocks `is_valid`; likely breaks existing consumers.
    High,
    /// Blocks `is_valid`; near-certain to break existing consumers or data.
    Critical,
}

/// Overall risk bucket for a validation run, derived from the worst
/// severity found plus the volume of affected records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    /// No breaking changes and low affected-record volume.
    Low,
    /// Some findings, moderate volume.
    Medium,
    /// At least one `High` finding, or high volume.
    High,
    /// At least one `Critical` finding, or very high volume.
    Critical,
}

/// A single detected breaking change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakingChange {
    /// Which rule produced this finding (e.g. `"PRIMARY_KEY_CHANGE"`).
    pub rule_id: &'static str,
    /// Severity of the finding.
    pub severity: Severity,
    /// Kind of schema resource affected (`"ObjectType"`, `"SharedProperty"`, ...).
    pub resource_type: &'static str,
    /// Name of the affected resource.
    pub resource_name: String,
    /// Name of the affected field, if the finding is field-scoped.
    pub field_name: Option<String>,
    /// Value before the change, if applicable.
    pub old_value: Option<Json>,
    /// Value after the change, if applicable.
    pub new_value: Option<Json>,
    /// Human-readable explanation.
    pub description: String,
    /// Populated by the `DataImpactAnalyzer` pass, if requested.
    pub impact_estimate: Option<ImpactEstimate>,
}

/// A non-blocking observation surfaced alongside breaking changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    /// Which rule produced this warning.
    pub rule_id: &'static str,
    /// Kind of schema resource the warning concerns.
    pub resource_type: &'static str,
    /// Name of the affected resource.
    pub resource_name: String,
    /// Human-readable explanation.
    pub message: String,
}

/// Per-breaking-change estimate of how costly it is to apply (§4.5 item 6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImpactEstimate {
    /// Records on the source branch matching the affected resource.
    pub affected_records: u64,
    /// `affected_records * 1ms`, per the spec's fixed per-record cost.
    pub estimated_duration_ms: u64,
    /// True for `Critical` findings.
    pub requires_downtime: bool,
}

/// Aggregate impact analysis across every breaking change in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    /// Sum of `ImpactEstimate::affected_records` across all findings.
    pub total_affected_records: u64,
    /// Services this change is known to affect (fixed list, per the source system).
    pub affected_services: Vec<String>,
    /// API routes this change is known to affect.
    pub affected_apis: Vec<String>,
    /// True if any finding is `Critical`.
    pub requires_maintenance_window: bool,
    /// Overall risk bucket.
    pub risk_level: RiskLevel,
}

/// One step of a generated migration (or its rollback counterpart).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationStep {
    /// Step category (e.g. `"backfill"`, `"dual_write"`, `"create_mapping_table"`).
    pub step_type: &'static str,
    /// Human-readable description.
    pub description: String,
    /// Estimated wall-clock cost.
    pub estimated_duration_ms: u64,
    /// Whether this step requires taking the resource offline.
    pub requires_downtime: bool,
    /// Suggested batch size for record-by-record migration steps.
    pub batch_size: u32,
}

/// A generated migration (plus rollback) for one breaking change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationPlan {
    /// The rule id of the breaking change this plan addresses.
    pub breaking_change_rule_id: &'static str,
    /// The affected resource name.
    pub resource_name: String,
    /// Forward steps, in execution order.
    pub steps: Vec<MigrationStep>,
    /// Steps that undo `steps`, in execution order.
    pub rollback_steps: Vec<MigrationStep>,
    /// Sum of `steps[*].estimated_duration_ms`.
    pub total_estimated_duration_ms: u64,
    /// True if any step in `steps` requires downtime.
    pub requires_downtime: bool,
}

/// Per-rule execution telemetry, surfaced for observability (§1B).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleExecutionResult {
    /// The rule id.
    pub rule_id: &'static str,
    /// False if the rule panicked or was skipped after cancellation.
    pub executed: bool,
    /// Wall-clock time spent in the rule.
    pub execution_time_ms: u64,
    /// Count of breaking changes the rule contributed.
    pub breaking_changes_found: usize,
    /// Count of warnings the rule contributed.
    pub warnings_found: usize,
    /// Present if the rule did not execute cleanly.
    pub error: Option<String>,
}

/// Input to a validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// Branch proposing the change (the "new" schema state).
    pub source_branch: String,
    /// Branch being merged into (the "old"/baseline schema state).
    pub target_branch: String,
    /// Whether to run the `DataImpactAnalyzer` pass.
    pub include_impact: bool,
    /// Whether to include non-blocking warnings in the result.
    pub include_warnings: bool,
    /// Free-form rule options (e.g. a caller-supplied type compatibility override).
    pub options: BTreeMap<String, Json>,
}

/// Full result of a validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Unique id for this validation run.
    pub validation_id: String,
    /// Echoes `ValidationRequest::source_branch`.
    pub source_branch: String,
    /// Echoes `ValidationRequest::target_branch`.
    pub target_branch: String,
    /// True iff no `Critical` or `High` breaking change was found.
    pub is_valid: bool,
    /// All breaking changes found, across all rules.
    pub breaking_changes: Vec<BreakingChange>,
    /// Non-blocking warnings, empty unless `include_warnings` was set.
    pub warnings: Vec<Warning>,
    /// Present iff `include_impact` was set.
    pub impact_analysis: Option<ImpactAnalysis>,
    /// One migration plan per breaking change.
    pub suggested_migrations: Vec<MigrationPlan>,
    /// Per-rule execution telemetry, keyed by rule id.
    pub rule_results: BTreeMap<&'static str, RuleExecutionResult>,
    /// Total wall-clock time for the run.
    pub total_time_ms: u64,
}
