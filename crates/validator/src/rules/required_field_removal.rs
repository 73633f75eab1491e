use super::{Rule, RuleOutcome};
use crate::schema::{ObjectTypeView, ValidationContext};
use crate::types::{BreakingChange, Severity};

/// A required `Property` present on the baseline schema was removed on the
/// proposed branch (§4.5 item 2).
pub struct RequiredFieldRemovalRule;

impl Rule for RequiredFieldRemovalRule {
    fn rule_id(&self) -> &'static str {
        "REQUIRED_FIELD_REMOVAL"
    }

    fn evaluate(&self, ctx: &ValidationContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::empty();

        for (name, target_json) in ctx.target_object_types {
            let target_view = ObjectTypeView::new(target_json);
            let source_view = ctx.source_object_types.get(name).map(|j| ObjectTypeView::new(j));

            for property in target_view.properties() {
                if !property.is_required() {
                    continue;
                }
                let Some(field_name) = property.name() else {
                    continue;
                };
                let still_present = source_view
                    .as_ref()
                    .map(|v| v.property(field_name).is_some())
                    .unwrap_or(false);
                if still_present {
                    continue;
                }
                outcome.breaking_changes.push(BreakingChange {
                    rule_id: self.rule_id(),
                    severity: Severity::High,
                    resource_type: "ObjectType",
                    resource_name: name.clone(),
                    field_name: Some(field_name.to_string()),
                    old_value: Some(serde_json::to_value(field_name).unwrap_or_default()),
                    new_value: None,
                    description: format!("required property '{field_name}' removed from '{name}'"),
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
    fn flags_removed_required_property() {
        let target = BTreeMap::from([(
            "Asset".to_string(),
            json!({"properties": [{"name": "name", "required": true}, {"name": "color", "required": false}]}),
        )]);
        let source = BTreeMap::from([(
            "Asset".to_string(),
            json!({"properties": [{"name": "color", "required": false}]}),
        )]);
        let shared = BTreeMap::new();
        let ctx = ValidationContext {
            target_object_types: &target,
            source_object_types: &source,
            target_shared_properties: &shared,
            source_shared_properties: &shared,
        };
        let outcome = RequiredFieldRemovalRule.evaluate(&ctx);
        assert_eq!(outcome.breaking_changes.len(), 1);
        assert_eq!(outcome.breaking_changes[0].field_name.as_deref(), Some("name"));
    }

    #[test]
    fn removing_optional_field_is_clean() {
        let target = BTreeMap::from([(
            "Asset".to_string(),
            json!({"properties": [{"name": "color", "required": false}]}),
        )]);
        let source = BTreeMap::from([("Asset".to_string(), json!({"properties": []}))]);
        let shared = BTreeMap::new();
        let ctx = ValidationContext {
            target_object_types: &target,
            source_object_types: &source,
            target_shared_properties: &shared,
            source_shared_properties: &shared,
        };
        assert!(RequiredFieldRemovalRule.evaluate(&ctx).breaking_changes.is_empty());
    }
}
