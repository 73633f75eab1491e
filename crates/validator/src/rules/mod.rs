//! Breaking-change rules (§4.5). Each rule satisfies a single capability,
//! `evaluate(ctx) -> RuleOutcome` — no shared base state, no ordering
//! dependency between rules, so the engine can fan them out freely.

mod data_impact;
mod primary_key_change;
mod required_field_removal;
mod shared_property_change;
mod type_compatibility;
mod type_incompatibility;

pub use data_impact::{DataImpactAnalyzer, RecordCounter};
pub use primary_key_change::PrimaryKeyChangeRule;
pub use required_field_removal::RequiredFieldRemovalRule;
pub use shared_property_change::SharedPropertyChangeRule;
pub use type_compatibility::TypeCompatibilityRule;
pub use type_incompatibility::TypeIncompatibilityRule;

use crate::schema::ValidationContext;
use crate::types::{BreakingChange, Warning};

/// What a single rule contributed to a validation run.
#[derive(Debug, Clone, Default)]
pub struct RuleOutcome {
    /// Breaking changes this rule found.
    pub breaking_changes: Vec<BreakingChange>,
    /// Non-blocking warnings this rule found.
    pub warnings: Vec<Warning>,
}

impl RuleOutcome {
    /// An outcome with no findings.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// A single breaking-change detection capability.
pub trait Rule: Send + Sync {
    /// Stable identifier, used in [`RuleExecutionResult`](crate::types::RuleExecutionResult)
    /// and as `BreakingChange::rule_id`.
    fn rule_id(&self) -> &'static str;

    /// Evaluate this rule against the two schema snapshots.
    fn evaluate(&self, ctx: &ValidationContext<'_>) -> RuleOutcome;
}

/// The standard rule set run by [`crate::engine::ValidationEngine`], in the
/// order the original `ValidationService` registered them.
pub fn standard_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(PrimaryKeyChangeRule),
        Box::new(RequiredFieldRemovalRule),
        Box::new(TypeIncompatibilityRule),
        Box::new(TypeCompatibilityRule),
        Box::new(SharedPropertyChangeRule),
    ]
}
