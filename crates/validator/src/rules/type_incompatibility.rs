use super::{Rule, RuleOutcome};
use crate::schema::{is_compatible_widening, is_hard_incompatible, ObjectTypeView, ValidationContext};
use crate::types::{BreakingChange, Severity};

/// A `Property`'s `dataTypeId` changed to something outside the documented
/// compatibility matrix (§4.5 item 3). Widenings are handled by
/// [`super::TypeCompatibilityRule`] instead and are not flagged here.
pub struct TypeIncompatibilityRule;

impl Rule for TypeIncompatibilityRule {
    fn rule_id(&self) -> &'static str {
        "TYPE_INCOMPATIBILITY"
    }

    fn evaluate(&self, ctx: &ValidationContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::empty();

        for (name, target_json) in ctx.target_object_types {
            let Some(source_json) = ctx.source_object_types.get(name) else {
                continue;
            };
            let target_view = ObjectTypeView::new(target_json);
            let source_view = ObjectTypeView::new(source_json);

            for target_prop in target_view.properties() {
                let Some(field_name) = target_prop.name() else {
                    continue;
                };
                let Some(source_prop) = source_view.property(field_name) else {
                    continue;
                };
                let (Some(from), Some(to)) = (target_prop.data_type_id(), source_prop.data_type_id()) else {
                    continue;
                };
                if from == to || is_compatible_widening(from, to) {
                    continue;
                }

                let severity = if is_hard_incompatible(from, to) {
                    Severity::Critical
                } else {
                    Severity::High
                };
                outcome.breaking_changes.push(BreakingChange {
                    rule_id: self.rule_id(),
                    severity,
                    resource_type: "ObjectType",
                    resource_name: name.clone(),
                    field_name: Some(field_name.to_string()),
                    old_value: Some(serde_json::Value::String(from.to_string())),
                    new_value: Some(serde_json::Value::String(to.to_string())),
                    description: format!("'{name}.{field_name}' changed type from {from} to {to}"),
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
    fn flags_string_to_integer_as_critical() {
        let target = BTreeMap::from([(
            "Asset".to_string(),
            json!({"properties": [{"name": "code", "dataTypeId": "string"}]}),
        )]);
        let source = BTreeMap::from([(
            "Asset".to_string(),
            json!({"properties": [{"name": "code", "dataTypeId": "integer"}]}),
        )]);
        let shared = BTreeMap::new();
        let ctx = ValidationContext {
            target_object_types: &target,
            source_object_types: &source,
            target_shared_properties: &shared,
            source_shared_properties: &shared,
        };
        let outcome = TypeIncompatibilityRule.evaluate(&ctx);
        assert_eq!(outcome.breaking_changes.len(), 1);
        assert_eq!(outcome.breaking_changes[0].severity, Severity::Critical);
    }

    #[test]
    fn widening_is_not_flagged() {
        let target = BTreeMap::from([(
            "Asset".to_string(),
            json!({"properties": [{"name": "count", "dataTypeId": "integer"}]}),
        )]);
        let source = BTreeMap::from([(
            "Asset".to_string(),
            json!({"properties": [{"name": "count", "dataTypeId": "long"}]}),
        )]);
        let shared = BTreeMap::new();
        let ctx = ValidationContext {
            target_object_types: &target,
            source_object_types: &source,
            target_shared_properties: &shared,
            source_shared_properties: &shared,
        };
        assert!(TypeIncompatibilityRule.evaluate(&ctx).breaking_changes.is_empty());
    }
}
