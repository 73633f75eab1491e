//! Per-target health tracking (§4.7 "Health": "each target exposes a
//! periodic health probe; router marks unhealthy targets").

use dashmap::DashMap;

use crate::routing::Target;

/// Tracks the last-known health of each publish target.
///
/// Targets default healthy until a probe or a delivery failure says
/// otherwise — this mirrors `oms-branch`'s `lifecycle_locks` shape (a
/// `DashMap` keyed by a small fixed enum, no persistence needed).
#[derive(Default)]
pub struct HealthRegistry {
    healthy: DashMap<Target, bool>,
}

impl HealthRegistry {
    /// A registry with every target assumed healthy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `target` is currently considered healthy.
    pub fn is_healthy(&self, target: Target) -> bool {
        self.healthy.get(&target).map(|h| *h).unwrap_or(true)
    }

    /// Record the outcome of a health probe or delivery attempt.
    pub fn set_healthy(&self, target: Target, healthy: bool) {
        self.healthy.insert(target, healthy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_target_defaults_healthy() {
        let registry = HealthRegistry::new();
        assert!(registry.is_healthy(Target::MsgBus));
    }

    #[test]
    fn set_healthy_is_observed() {
        let registry = HealthRegistry::new();
        registry.set_healthy(Target::CloudBus, false);
        assert!(!registry.is_healthy(Target::CloudBus));
    }
}
