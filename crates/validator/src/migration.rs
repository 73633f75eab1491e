//! Migration plan generation (§4.5 "Migration plan generator").

use crate::types::{BreakingChange, MigrationPlan, MigrationStep};

/// Build one [`MigrationPlan`] (forward steps + rollback) per breaking change.
pub fn generate_migration_plans(breaking_changes: &[BreakingChange]) -> Vec<MigrationPlan> {
    breaking_changes.iter().map(plan_for).collect()
}

fn plan_for(change: &BreakingChange) -> MigrationPlan {
    let affected_records = change
        .impact_estimate
        .map(|e| e.affected_records)
        .unwrap_or(0);

    let steps = match change.rule_id {
        "PRIMARY_KEY_CHANGE" => vec![
            step(
                "create_mapping_table",
                format!(
                    "create a mapping table from old to new primary key for '{}'",
                    change.resource_name
                ),
                affected_records,
                false,
            ),
            step(
                "backfill",
                format!("backfill '{}' records under the new primary key", change.resource_name),
                affected_records,
                true,
            ),
        ],
        "REQUIRED_FIELD_REMOVAL" => vec![step(
            "archive",
            format!(
                "archive existing values of '{}' before removal",
                change.field_name.as_deref().unwrap_or("field")
            ),
            affected_records,
            false,
        )],
        "TYPE_INCOMPATIBILITY" => vec![step(
            "dual_write",
            format!(
                "transform '{}.{}' from {:?} to {:?}",
                change.resource_name,
                change.field_name.as_deref().unwrap_or("field"),
                change.old_value,
                change.new_value
            ),
            affected_records,
            change.severity == crate::types::Severity::Critical,
        )],
        "SHARED_PROPERTY_CHANGE" => vec![step(
            "dual_write",
            format!("migrate consumers of shared property '{}' to the new type", change.resource_name),
            affected_records,
            false,
        )],
        _ => vec![step(
            "backfill",
            format!("apply schema change to '{}'", change.resource_name),
            affected_records,
            false,
        )],
    };

    let rollback_steps: Vec<MigrationStep> = steps.iter().rev().map(rollback_of).collect();
    let total_estimated_duration_ms = steps.iter().map(|s| s.estimated_duration_ms).sum();
    let requires_downtime = steps.iter().any(|s| s.requires_downtime);

    MigrationPlan {
        breaking_change_rule_id: change.rule_id,
        resource_name: change.resource_name.clone(),
        steps,
        rollback_steps,
        total_estimated_duration_ms,
        requires_downtime,
    }
}

fn step(step_type: &'static str, description: String, affected_records: u64, requires_downtime: bool) -> MigrationStep {
    MigrationStep {
        step_type,
        description,
        estimated_duration_ms: affected_records.max(1),
        requires_downtime,
        batch_size: 1_000,
    }
}

fn rollback_of(forward: &MigrationStep) -> MigrationStep {
    MigrationStep {
        step_type: forward.step_type,
        description: format!("rollback: {}", forward.description),
        estimated_duration_ms: forward.estimated_duration_ms,
        requires_downtime: forward.requires_downtime,
        batch_size: forward.batch_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    #[test]
    fn primary_key_change_gets_two_forward_steps_and_symmetric_rollback() {
        let change = BreakingChange {
            rule_id: "PRIMARY_KEY_CHANGE",
            severity: Severity::Critical,
            resource_type: "ObjectType",
            resource_name: "Asset".to_string(),
            field_name: None,
            old_value: None,
            new_value: None,
            description: "test".to_string(),
            impact_estimate: None,
        };
        let plans = generate_migration_plans(&[change]);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].steps.len(), 2);
        assert_eq!(plans[0].rollback_steps.len(), 2);
        assert!(plans[0].requires_downtime);
    }
}
