use super::{Rule, RuleOutcome};
use crate::schema::{ObjectTypeView, ValidationContext};
use crate::types::{BreakingChange, Severity};

/// An `ObjectType`'s primary-key property changed name or type (§4.5 item 1).
pub struct PrimaryKeyChangeRule;

impl Rule for PrimaryKeyChangeRule {
    fn rule_id(&self) -> &'static str {
        "PRIMARY_KEY_CHANGE"
    }

    fn evaluate(&self, ctx: &ValidationContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::empty();

        for (name, target_json) in ctx.target_object_types {
            let Some(source_json) = ctx.source_object_types.get(name) else {
                continue;
            };
            let target_pk = ObjectTypeView::new(target_json).primary_key();
            let source_pk = ObjectTypeView::new(source_json).primary_key();

            let (Some(target_pk), Some(source_pk)) = (target_pk, source_pk) else {
                continue;
            };
            let (target_name, source_name) = (target_pk.name(), source_pk.name());
            let (target_type, source_type) = (target_pk.data_type_id(), source_pk.data_type_id());

            if target_name != source_name || target_type != source_type {
                outcome.breaking_changes.push(BreakingChange {
                    rule_id: self.rule_id(),
                    severity: Severity::Critical,
                    resource_type: "ObjectType",
                    resource_name: name.clone(),
                    field_name: target_name.map(str::to_string),
                    old_value: target_json.get("properties").cloned(),
                    new_value: source_json.get("properties").cloned(),
                    description: format!(
                        "primary key of '{name}' changed from {target_name:?}:{target_type:?} to {source_name:?}:{source_type:?}"
                    ),
                    impact_estimate: None,
                });
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn flags_renamed_primary_key() {
        let target = BTreeMap::from([(
            "Asset".to_string(),
            json!({"properties": [{"name": "id", "dataTypeId": "string", "primaryKey": true}]}),
        )]);
        let source = BTreeMap::from([(
            "Asset".to_string(),
            json!({"properties": [{"name": "assetId", "dataTypeId": "string", "primaryKey": true}]}),
        )]);
        let shared = BTreeMap::new();
        let ctx = ValidationContext {
            target_object_types: &target,
            source_object_types: &source,
            target_shared_properties: &shared,
            source_shared_properties: &shared,
        };
        let outcome = PrimaryKeyChangeRule.evaluate(&ctx);
        assert_eq!(outcome.breaking_changes.len(), 1);
        assert_eq!(outcome.breaking_changes[0].severity, Severity::Critical);
    }

    #[test]
    fn unchanged_primary_key_is_clean() {
        let schema = BTreeMap::from([(
            "Asset".to_string(),
            json!({"properties": [{"name": "id", "dataTypeId": "string", "primaryKey": true}]}),
        )]);
        let shared = BTreeMap::new();
        let ctx = ValidationContext {
            target_object_types: &schema,
            source_object_types: &schema,
            target_shared_properties: &shared,
            source_shared_properties: &shared,
        };
        assert!(PrimaryKeyChangeRule.evaluate(&ctx).breaking_changes.is_empty());
    }
}
