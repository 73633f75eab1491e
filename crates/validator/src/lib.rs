//! Breaking-Change Validator (§4.5).
//!
//! Diffs two branches' ontology schemas through a fixed rule set —
//! primary-key changes, required-field removal, type (in)compatibility,
//! shared-property changes — run in parallel, then layers a data-impact
//! pass and a migration-plan generator on top of the findings.

#![warn(missing_docs)]

pub mod engine;
pub mod migration;
pub mod rules;
pub mod schema;
pub mod types;

pub use engine::{ValidationEngine, VALIDATION_BUDGET};
pub use rules::RecordCounter;
pub use schema::ValidationContext;
pub use types::{
    BreakingChange, ImpactAnalysis, ImpactEstimate, MigrationPlan, MigrationStep, RiskLevel,
    RuleExecutionResult, Severity, ValidationRequest, ValidationResult, Warning,
};
