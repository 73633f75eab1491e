use crate::types::{BreakingChange, ImpactAnalysis, ImpactEstimate, RiskLevel, Severity};

/// Counts live records for a resource on a branch. Implemented by the
/// caller (typically backed by `oms-store::DocumentRepository::list`) so
/// this crate stays free of a storage dependency.
pub trait RecordCounter: Send + Sync {
    /// Number of documents of `resource_type` named `resource_name` on `branch`.
    fn count_records(&self, branch: &str, resource_type: &str, resource_name: &str) -> u64;
}

/// Per-change record-count impact estimation, plus the aggregate
/// risk-level calculation (§4.5 item 6).
pub struct DataImpactAnalyzer;

const AFFECTED_SERVICES: &[&str] = &["schema-service", "validation-service"];

impl DataImpactAnalyzer {
    /// Fill in `ImpactEstimate` on every breaking change and roll the
    /// results up into an [`ImpactAnalysis`].
    pub fn analyze(
        &self,
        breaking_changes: &mut [BreakingChange],
        source_branch: &str,
        counter: &dyn RecordCounter,
    ) -> ImpactAnalysis {
        let mut total_affected_records: u64 = 0;
        let mut affected_apis = Vec::new();

        for change in breaking_changes.iter_mut() {
            let affected_records =
                counter.count_records(source_branch, change.resource_type, &change.resource_name);
            total_affected_records += affected_records;

            let api_path = format!("/api/v1/{}s", change.resource_name.to_lowercase());
            if !affected_apis.contains(&api_path) {
                affected_apis.push(api_path);
            }

            change.impact_estimate = Some(ImpactEstimate {
                affected_records,
                estimated_duration_ms: affected_records,
                requires_downtime: change.severity == Severity::Critical,
            });
        }

        let risk_level = Self::risk_level(breaking_changes, total_affected_records);
        ImpactAnalysis {
            total_affected_records,
            affected_services: AFFECTED_SERVICES.iter().map(|s| s.to_string()).collect(),
            affected_apis,
            requires_maintenance_window: breaking_changes
                .iter()
                .any(|bc| bc.severity == Severity::Critical),
            risk_level,
        }
    }

    fn risk_level(breaking_changes: &[BreakingChange], affected_records: u64) -> RiskLevel {
        let critical_count = breaking_changes.iter().filter(|bc| bc.severity == Severity::Critical).count();
        let high_count = breaking_changes.iter().filter(|bc| bc.severity == Severity::High).count();

        if critical_count > 0 || affected_records > 1_000_000 {
            RiskLevel::Critical
        } else if high_count > 0 || affected_records > 100_000 {
            RiskLevel::High
        } else if !breaking_changes.is_empty() || affected_records > 10_000 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCounter(u64);
    impl RecordCounter for FixedCounter {
        fn count_records(&self, _branch: &str, _resource_type: &str, _resource_name: &str) -> u64 {
            self.0
        }
    }

    fn change(severity: Severity) -> BreakingChange {
        BreakingChange {
            rule_id: "PRIMARY_KEY_CHANGE",
            severity,
            resource_type: "ObjectType",
            resource_name: "Asset".to_string(),
            field_name: None,
            old_value: None,
            new_value: None,
            description: "test".to_string(),
            impact_estimate: None,
        }
    }

    #[test]
    fn critical_finding_forces_critical_risk() {
        let mut changes = vec![change(Severity::Critical)];
        let analysis = DataImpactAnalyzer.analyze(&mut changes, "proposal/1", &FixedCounter(10));
        assert_eq!(analysis.risk_level, RiskLevel::Critical);
        assert!(changes[0].impact_estimate.unwrap().requires_downtime);
    }

    #[test]
    fn high_volume_alone_forces_high_risk() {
        let mut changes = vec![change(Severity::Low)];
        let analysis = DataImpactAnalyzer.analyze(&mut changes, "proposal/1", &FixedCounter(200_000));
        assert_eq!(analysis.risk_level, RiskLevel::High);
    }

    #[test]
    fn no_findings_and_low_volume_is_low_risk() {
        let mut changes: Vec<BreakingChange> = vec![];
        let analysis = DataImpactAnalyzer.analyze(&mut changes, "proposal/1", &FixedCounter(0));
        assert_eq!(analysis.risk_level, RiskLevel::Low);
    }
}
