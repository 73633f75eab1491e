use super::{Rule, RuleOutcome};
use crate::schema::{ObjectTypeView, ValidationContext};
use crate::types::{BreakingChange, Severity};

/// A `SharedProperty`'s type changed while at least one `ObjectType` still
/// references it (§4.5 item 5).
pub struct SharedPropertyChangeRule;

impl Rule for SharedPropertyChangeRule {
    fn rule_id(&self) -> &'static str {
        "SHARED_PROPERTY_CHANGE"
    }

    fn evaluate(&self, ctx: &ValidationContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::empty();

        for (name, target_json) in ctx.target_shared_properties {
            let Some(source_json) = ctx.source_shared_properties.get(name) else {
                continue;
            };
            let from = target_json.get("dataTypeId").and_then(serde_json::Value::as_str);
            let to = source_json.get("dataTypeId").and_then(serde_json::Value::as_str);
            if from == to {
                continue;
            }
            let (Some(from), Some(to)) = (from, to) else {
                continue;
            };

            if !is_referenced(name, ctx) {
                continue;
            }

            outcome.breaking_changes.push(BreakingChange {
                rule_id: self.rule_id(),
                severity: Severity::High,
                resource_type: "SharedProperty",
                resource_name: name.clone(),
                field_name: None,
                old_value: Some(serde_json::Value::String(from.to_string())),
                new_value: Some(serde_json::Value::String(to.to_string())),
                description: format!("referenced shared property '{name}' changed type from {from} to {to}"),
                impact_estimate: None,
            });
        }

        outcome
    }
}

fn is_referenced(shared_property_name: &str, ctx: &ValidationContext<'_>) -> bool {
    ctx.target_object_types
        .values()
        .chain(ctx.source_object_types.values())
        .any(|json| {
            ObjectTypeView::new(json)
                .properties()
                .iter()
                .any(|p| p.shared_property_id() == Some(shared_property_name))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn flags_referenced_shared_property_type_change() {
        let target_shared = BTreeMap::from([("Email".to_string(), json!({"dataTypeId": "string"}))]);
        let source_shared = BTreeMap::from([("Email".to_string(), json!({"dataTypeId": "long"}))]);
        let object_types = BTreeMap::from([(
            "User".to_string(),
            json!({"properties": [{"name": "email", "sharedPropertyId": "Email"}]}),
        )]);
        let ctx = ValidationContext {
            target_object_types: &object_types,
            source_object_types: &object_types,
            target_shared_properties: &target_shared,
            source_shared_properties: &source_shared,
        };
        let outcome = SharedPropertyChangeRule.evaluate(&ctx);
        assert_eq!(outcome.breaking_changes.len(), 1);
    }

    #[test]
    fn unreferenced_shared_property_is_not_flagged() {
        let target_shared = BTreeMap::from([("Email".to_string(), json!({"dataTypeId": "string"}))]);
        let source_shared = BTreeMap::from([("Email".to_string(), json!({"dataTypeId": "long"}))]);
        let object_types: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        let ctx = ValidationContext {
            target_object_types: &object_types,
            source_object_types: &object_types,
            target_shared_properties: &target_shared,
            source_shared_properties: &source_shared,
        };
        assert!(SharedPropertyChangeRule.evaluate(&ctx).breaking_changes.is_empty());
    }
}
