//! Publisher loop: claims pending rows, routes them, and attempts delivery
//! (§4.7's `every 500 ms: select -> route_and_publish -> mark/retry` cycle).
//!
//! Grounded in `oms-durability::recovery::replay`'s claim-and-apply loop,
//! generalized from a one-shot startup replay into a recurring drain.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cloudevents::derive_subject;
use crate::health::HealthRegistry;
use crate::routing::{healthy_first, route, RouteStrategy, RoutingRule, Target};
use crate::store::OutboxStore;
use crate::types::{CloudEvent, OutboxEvent};

/// A publish destination a [`Publisher`] can dispatch [`CloudEvent`]s to.
pub trait PublishTarget: Send + Sync {
    /// Which [`Target`] this implements.
    fn target(&self) -> Target;
    /// Attempt delivery; `Err` increments the outbox row's retry count.
    fn publish(&self, event: &CloudEvent) -> Result<(), String>;
}

/// Poll interval between outbox drains (§4.7: "every 500 ms").
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Rows claimed per drain (§4.7: "limit=100").
pub const BATCH_SIZE: usize = 100;

/// Drains the outbox on a fixed interval, routing each row to its targets.
pub struct Publisher {
    outbox: Arc<OutboxStore>,
    rules: Vec<RoutingRule>,
    health: Arc<HealthRegistry>,
    targets: HashMap<Target, Box<dyn PublishTarget>>,
    source: String,
}

impl Publisher {
    /// Build a publisher over a shared outbox and target set.
    pub fn new(
        outbox: Arc<OutboxStore>,
        rules: Vec<RoutingRule>,
        health: Arc<HealthRegistry>,
        targets: Vec<Box<dyn PublishTarget>>,
        source: impl Into<String>,
    ) -> Self {
        Publisher {
            outbox,
            rules,
            health,
            targets: targets.into_iter().map(|t| (t.target(), t)).collect(),
            source: source.into(),
        }
    }

    /// Run the poll loop forever, sleeping [`POLL_INTERVAL`] between drains.
    /// Intended to run as one long-lived task per process (§4.7: "single
    /// process-wide, or sharded by hash of event id").
    pub async fn run(&self) -> ! {
        loop {
            self.drain_once();
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// One drain cycle: claim pending rows and attempt delivery. Exposed
    /// separately from [`Self::run`] so tests can exercise it without the
    /// sleep.
    pub fn drain_once(&self) {
        let batch = self.outbox.select_pending(BATCH_SIZE);
        for row in &batch {
            self.process_row(row);
        }
    }

    fn process_row(&self, row: &OutboxEvent) {
        let Some(rule) = route(&self.rules, &row.event_type, row.branch.as_str()) else {
            warn!(event_type = %row.event_type, "no routing rule matched, leaving pending");
            return;
        };
        let resource_id = row
            .payload
            .get("resource_id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("");
        let mut event = CloudEvent::from_outbox_event(row, self.source.clone(), None);
        event.subject = Some(derive_subject(&row.event_type, row.branch.as_str(), resource_id));

        let delivered = match rule.strategy {
            RouteStrategy::All | RouteStrategy::Conditional => self.deliver_all(&rule.targets, &event),
            RouteStrategy::PrimaryOnly => self.deliver_one(rule.targets.first().copied(), &event),
            RouteStrategy::Failover => {
                let ordered = healthy_first(&rule.targets, &self.health);
                self.deliver_failover(&ordered, &event)
            }
        };

        match delivered {
            Ok(()) => {
                self.outbox.mark_published(&row.id);
                info!(event_type = %row.event_type, id = %row.id, "published");
            }
            Err(e) => {
                warn!(event_type = %row.event_type, id = %row.id, error = %e, "delivery failed");
                self.outbox.increment_retry(&row.id, e);
            }
        }
    }

    fn deliver_all(&self, targets: &[Target], event: &CloudEvent) -> Result<(), String> {
        let mut last_err = None;
        let mut any_ok = false;
        for target in targets {
            match self.send(*target, event) {
                Ok(()) => any_ok = true,
                Err(e) => last_err = Some(e),
            }
        }
        if any_ok {
            Ok(())
        } else {
            Err(last_err.unwrap_or_else(|| "no targets configured".into()))
        }
    }

    fn deliver_one(&self, target: Option<Target>, event: &CloudEvent) -> Result<(), String> {
        match target {
            Some(t) => self.send(t, event),
            None => Err("no primary target configured".into()),
        }
    }

    fn deliver_failover(&self, ordered: &[Target], event: &CloudEvent) -> Result<(), String> {
        let mut last_err = None;
        for target in ordered {
            match self.send(*target, event) {
                Ok(()) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| "no targets configured".into()))
    }

    fn send(&self, target: Target, event: &CloudEvent) -> Result<(), String> {
        let Some(publisher) = self.targets.get(&target) else {
            return Err(format!("{target:?} has no registered publisher"));
        };
        match publisher.publish(event) {
            Ok(()) => {
                self.health.set_healthy(target, true);
                Ok(())
            }
            Err(e) => {
                self.health.set_healthy(target, false);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RoutingRule;
    use crate::types::OutboxEvent;
    use oms_core::BranchName;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockTarget {
        kind: Target,
        fail: AtomicBool,
    }

    impl PublishTarget for MockTarget {
        fn target(&self) -> Target {
            self.kind
        }
        fn publish(&self, _event: &CloudEvent) -> Result<(), String> {
            if self.fail.load(Ordering::SeqCst) {
                Err("simulated failure".into())
            } else {
                Ok(())
            }
        }
    }

    fn row(event_type: &str) -> OutboxEvent {
        OutboxEvent::new(
            event_type,
            BranchName::new("main").unwrap(),
            None,
            json!({"resource_id": "Asset"}),
        )
    }

    #[test]
    fn all_strategy_succeeds_if_one_target_succeeds() {
        let outbox = Arc::new(OutboxStore::new());
        let e = row("com.foundry.oms.schema.changed");
        let id = e.id.clone();
        outbox.insert(e).unwrap();

        let targets: Vec<Box<dyn PublishTarget>> = vec![
            Box::new(MockTarget { kind: Target::MsgBus, fail: AtomicBool::new(true) }),
            Box::new(MockTarget { kind: Target::CloudBus, fail: AtomicBool::new(false) }),
        ];
        let publisher = Publisher::new(
            outbox.clone(),
            crate::routing::default_rules(),
            Arc::new(HealthRegistry::new()),
            targets,
            "urn:oms:test",
        );
        publisher.drain_once();
        assert_eq!(outbox.get(&id).unwrap().status, crate::types::OutboxStatus::Published);
    }

    #[test]
    fn primary_only_fails_overall_on_primary_failure() {
        let outbox = Arc::new(OutboxStore::new());
        let e = row("com.foundry.oms.action.invoked");
        let id = e.id.clone();
        outbox.insert(e).unwrap();

        let targets: Vec<Box<dyn PublishTarget>> =
            vec![Box::new(MockTarget { kind: Target::MsgBus, fail: AtomicBool::new(true) })];
        let publisher = Publisher::new(
            outbox.clone(),
            crate::routing::default_rules(),
            Arc::new(HealthRegistry::new()),
            targets,
            "urn:oms:test",
        );
        publisher.drain_once();
        let stored = outbox.get(&id).unwrap();
        assert_eq!(stored.status, crate::types::OutboxStatus::Pending);
        assert_eq!(stored.retry_count, 1);
    }

    #[test]
    fn failover_skips_unhealthy_primary() {
        let outbox = Arc::new(OutboxStore::new());
        let e = row("com.foundry.oms.branch.merged");
        let id = e.id.clone();
        outbox.insert(e).unwrap();

        let health = Arc::new(HealthRegistry::new());
        health.set_healthy(Target::MsgBus, false);

        let targets: Vec<Box<dyn PublishTarget>> = vec![
            Box::new(MockTarget { kind: Target::MsgBus, fail: AtomicBool::new(true) }),
            Box::new(MockTarget { kind: Target::CloudBus, fail: AtomicBool::new(false) }),
        ];
        let rules = vec![RoutingRule {
            type_pattern: "*.branch.*".into(),
            targets: vec![Target::MsgBus, Target::CloudBus],
            strategy: RouteStrategy::Failover,
            priority: 100,
            branch_condition: None,
        }];
        let publisher = Publisher::new(outbox.clone(), rules, health, targets, "urn:oms:test");
        publisher.drain_once();
        assert_eq!(outbox.get(&id).unwrap().status, crate::types::OutboxStatus::Published);
    }
}
