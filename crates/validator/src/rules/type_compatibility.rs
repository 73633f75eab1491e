use super::{Rule, RuleOutcome};
use crate::schema::{is_compatible_widening, ObjectTypeView, ValidationContext};
use crate::types::Warning;

/// Soft counterpart to [`super::TypeIncompatibilityRule`]: flags documented
/// safe widenings (e.g. `integer` -> `long`) as warnings rather than
/// breaking changes (§4.5 item 4).
pub struct TypeCompatibilityRule;

impl Rule for TypeCompatibilityRule {
    fn rule_id(&self) -> &'static str {
        "TYPE_COMPATIBILITY"
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
                if from != to && is_compatible_widening(from, to) {
                    outcome.warnings.push(Warning {
                        rule_id: self.rule_id(),
                        resource_type: "ObjectType",
                        resource_name: name.clone(),
                        message: format!(
                            "'{name}.{field_name}' widened from {from} to {to}; safe but consider backfilling existing readers"
                        ),
                    });
                }
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
    fn widening_produces_a_warning() {
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
        let outcome = TypeCompatibilityRule.evaluate(&ctx);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.breaking_changes.is_empty());
    }
}
