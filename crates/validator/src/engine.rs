//! Validation orchestration (§4.5): fans the rule set out in parallel,
//! aggregates findings, then runs the impact analysis and migration
//! planning passes over the result.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::migration::generate_migration_plans;
use crate::rules::{standard_rules, DataImpactAnalyzer, Rule, RecordCounter};
use crate::schema::ValidationContext;
use crate::types::{
    BreakingChange, RuleExecutionResult, Severity, ValidationRequest, ValidationResult, Warning,
};

/// §4.5 "Performance contract": typical repositories must validate within
/// this budget. Exceeding it does not abort the run — it's logged, since
/// an in-memory rule pass with no I/O essentially never exceeds it — but a
/// future remote rule could check [`Instant::elapsed`] against it directly.
pub const VALIDATION_BUDGET: Duration = Duration::from_secs(30);

/// Orchestrates the breaking-change rule set.
pub struct ValidationEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self { rules: standard_rules() }
    }
}

impl ValidationEngine {
    /// Build an engine with the standard rule set (§4.5 items 1-5).
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every rule in parallel against the two schema snapshots, then —
    /// if requested — the impact analyzer and migration planner.
    pub fn validate(
        &self,
        request: &ValidationRequest,
        ctx: &ValidationContext<'_>,
        counter: &dyn RecordCounter,
    ) -> ValidationResult {
        let started = Instant::now();
        let validation_id = uuid::Uuid::new_v4().to_string();

        let per_rule: Vec<(&'static str, RuleExecutionResult, Vec<BreakingChange>, Vec<Warning>)> = self
            .rules
            .par_iter()
            .map(|rule| {
                let rule_started = Instant::now();
                let outcome = rule.evaluate(ctx);
                let execution_time_ms = rule_started.elapsed().as_millis() as u64;
                let result = RuleExecutionResult {
                    rule_id: rule.rule_id(),
                    executed: true,
                    execution_time_ms,
                    breaking_changes_found: outcome.breaking_changes.len(),
                    warnings_found: outcome.warnings.len(),
                    error: None,
                };
                (rule.rule_id(), result, outcome.breaking_changes, outcome.warnings)
            })
            .collect();

        let mut breaking_changes = Vec::new();
        let mut warnings = Vec::new();
        let mut rule_results = BTreeMap::new();
        for (rule_id, result, mut bc, mut w) in per_rule {
            breaking_changes.append(&mut bc);
            warnings.append(&mut w);
            rule_results.insert(rule_id, result);
        }

        let impact_analysis = if request.include_impact {
            Some(DataImpactAnalyzer.analyze(&mut breaking_changes, &request.source_branch, counter))
        } else {
            None
        };

        let suggested_migrations = generate_migration_plans(&breaking_changes);

        let is_valid = !breaking_changes
            .iter()
            .any(|bc| matches!(bc.severity, Severity::Critical | Severity::High));

        let total_time_ms = started.elapsed().as_millis() as u64;
        if started.elapsed() > VALIDATION_BUDGET {
            tracing::warn!(
                validation_id,
                total_time_ms,
                "validation exceeded the {}s budget",
                VALIDATION_BUDGET.as_secs()
            );
        }

        ValidationResult {
            validation_id,
            source_branch: request.source_branch.clone(),
            target_branch: request.target_branch.clone(),
            is_valid,
            breaking_changes,
            warnings: if request.include_warnings { warnings } else { Vec::new() },
            impact_analysis,
            suggested_migrations,
            rule_results,
            total_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap as Map;

    struct ZeroCounter;
    impl RecordCounter for ZeroCounter {
        fn count_records(&self, _branch: &str, _resource_type: &str, _resource_name: &str) -> u64 {
            0
        }
    }

    #[test]
    fn clean_schemas_produce_a_valid_result() {
        let schema = Map::from([(
            "Asset".to_string(),
            json!({"properties": [{"name": "id", "dataTypeId": "string", "primaryKey": true, "required": true}]}),
        )]);
        let shared = Map::new();
        let ctx = ValidationContext {
            target_object_types: &schema,
            source_object_types: &schema,
            target_shared_properties: &shared,
            source_shared_properties: &shared,
        };
        let request = ValidationRequest {
            source_branch: "proposal/1".to_string(),
            target_branch: "main".to_string(),
            include_impact: true,
            include_warnings: true,
            options: Map::new(),
        };
        let result = ValidationEngine::new().validate(&request, &ctx, &ZeroCounter);
        assert!(result.is_valid);
        assert!(result.breaking_changes.is_empty());
        assert_eq!(result.rule_results.len(), 5);
        assert!(result.impact_analysis.is_some());
    }

    #[test]
    fn critical_change_marks_result_invalid_with_migration_plan() {
        let target = Map::from([(
            "Asset".to_string(),
            json!({"properties": [{"name": "id", "dataTypeId": "string", "primaryKey": true}]}),
        )]);
        let source = Map::from([(
            "Asset".to_string(),
            json!({"properties": [{"name": "assetId", "dataTypeId": "string", "primaryKey": true}]}),
        )]);
        let shared = Map::new();
        let ctx = ValidationContext {
            target_object_types: &target,
            source_object_types: &source,
            target_shared_properties: &shared,
            source_shared_properties: &shared,
        };
        let request = ValidationRequest {
            source_branch: "proposal/1".to_string(),
            target_branch: "main".to_string(),
            include_impact: true,
            include_warnings: false,
            options: Map::new(),
        };
        let result = ValidationEngine::new().validate(&request, &ctx, &ZeroCounter);
        assert!(!result.is_valid);
        assert_eq!(result.suggested_migrations.len(), 1);
        assert!(result.warnings.is_empty());
    }
}
