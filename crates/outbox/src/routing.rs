//! Event routing: type-pattern rules dispatching to one or more targets
//! under a delivery strategy (§4.7 "Routing").

use crate::health::HealthRegistry;

/// A publish destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    /// The internal message bus (NATS-shaped, binary CloudEvents).
    MsgBus,
    /// The external cloud event bus (structured CloudEvents over HTTP).
    CloudBus,
}

/// How a rule's target set is used to decide overall delivery success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStrategy {
    /// Publish to every target in parallel; delivered if at least one succeeds.
    All,
    /// Publish only to the first (primary) target; its failure is the overall failure.
    PrimaryOnly,
    /// Try targets in order, healthy-first; stop at the first success.
    Failover,
    /// Same as [`RouteStrategy::All`], evaluated only once `conditions` match.
    Conditional,
}

/// One routing rule (§4.7: `(type_pattern, target_set, strategy, optional_conditions)`).
#[derive(Debug, Clone)]
pub struct RoutingRule {
    /// Glob-style pattern matched against the event type, e.g. `"*.schema.*"`.
    pub type_pattern: String,
    /// Targets this rule may dispatch to, primary first.
    pub targets: Vec<Target>,
    /// Delivery strategy.
    pub strategy: RouteStrategy,
    /// Evaluated in descending priority; first match wins.
    pub priority: i32,
    /// Only relevant for [`RouteStrategy::Conditional`]; a branch glob, e.g. `"release/*"`.
    pub branch_condition: Option<String>,
}

/// The default rule set (§4.7 "Defaults").
pub fn default_rules() -> Vec<RoutingRule> {
    vec![
        RoutingRule {
            type_pattern: "*.schema.*".into(),
            targets: vec![Target::MsgBus, Target::CloudBus],
            strategy: RouteStrategy::All,
            priority: 100,
            branch_condition: None,
        },
        RoutingRule {
            type_pattern: "*.branch.*".into(),
            targets: vec![Target::MsgBus, Target::CloudBus],
            strategy: RouteStrategy::Failover,
            priority: 90,
            branch_condition: None,
        },
        RoutingRule {
            type_pattern: "*.action.*".into(),
            targets: vec![Target::MsgBus],
            strategy: RouteStrategy::PrimaryOnly,
            priority: 80,
            branch_condition: None,
        },
        RoutingRule {
            type_pattern: "*.system.*".into(),
            targets: vec![Target::MsgBus, Target::CloudBus],
            strategy: RouteStrategy::All,
            priority: 70,
            branch_condition: None,
        },
        RoutingRule {
            type_pattern: "*".into(),
            targets: vec![Target::MsgBus],
            strategy: RouteStrategy::PrimaryOnly,
            priority: 0,
            branch_condition: None,
        },
    ]
}

/// Whether a `*`-wildcard glob pattern matches a dotted event type.
fn glob_matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let mut segments = pattern.split('*');
    let first = segments.next().unwrap_or("");
    if !value.starts_with(first) {
        return false;
    }
    let mut rest = &value[first.len()..];
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        match rest.find(segment) {
            Some(idx) => rest = &rest[idx + segment.len()..],
            None => return false,
        }
    }
    true
}

/// The first matching rule for `event_type`, by descending priority
/// (§4.7: "evaluated in descending priority; first match wins").
pub fn route<'a>(rules: &'a [RoutingRule], event_type: &str, branch: &str) -> Option<&'a RoutingRule> {
    let mut candidates: Vec<&RoutingRule> = rules
        .iter()
        .filter(|r| glob_matches(&r.type_pattern, event_type))
        .filter(|r| match (&r.branch_condition, r.strategy) {
            (Some(pattern), RouteStrategy::Conditional) => glob_matches(pattern, branch),
            (None, RouteStrategy::Conditional) => true,
            _ => true,
        })
        .collect();
    candidates.sort_by_key(|r| std::cmp::Reverse(r.priority));
    candidates.into_iter().next()
}

/// Order a rule's targets healthy-first, for [`RouteStrategy::Failover`]
/// (§4.7 "Health": "router marks unhealthy targets and skips them in
/// FAILOVER ordering").
pub fn healthy_first(targets: &[Target], health: &HealthRegistry) -> Vec<Target> {
    let mut ordered: Vec<Target> = targets.to_vec();
    ordered.sort_by_key(|t| !health.is_healthy(*t));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_events_route_to_all() {
        let rules = default_rules();
        let rule = route(&rules, "com.foundry.oms.schema.changed", "main").unwrap();
        assert_eq!(rule.strategy, RouteStrategy::All);
        assert_eq!(rule.targets, vec![Target::MsgBus, Target::CloudBus]);
    }

    #[test]
    fn action_events_route_primary_only() {
        let rules = default_rules();
        let rule = route(&rules, "com.foundry.oms.action.invoked", "main").unwrap();
        assert_eq!(rule.strategy, RouteStrategy::PrimaryOnly);
        assert_eq!(rule.targets, vec![Target::MsgBus]);
    }

    #[test]
    fn unmatched_type_falls_back_to_catch_all() {
        let rules = default_rules();
        let rule = route(&rules, "com.foundry.oms.widget.spun", "main").unwrap();
        assert_eq!(rule.priority, 0);
    }

    #[test]
    fn healthy_first_demotes_unhealthy_primary() {
        let health = HealthRegistry::new();
        health.set_healthy(Target::MsgBus, false);
        let ordered = healthy_first(&[Target::MsgBus, Target::CloudBus], &health);
        assert_eq!(ordered, vec![Target::CloudBus, Target::MsgBus]);
    }
}
