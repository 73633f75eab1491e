//! Pre-commit validation hooks (§9C), generalizing
//! `data_kernel/hook/pipeline.py`'s `CommitHookPipeline`: a registration-ordered
//! chain of checks run before a mutation commits, short-circuiting on the
//! first rejection. Unlike the Python pipeline this carries no sinks/async
//! hooks — outbox publication (the sink side) is [`crate::service::SchemaService`]'s
//! own concern, not a hook's.

use oms_core::{BranchName, EntityKind, OmsResult};
use serde_json::Value as Json;

/// What a [`ValidationHook`] sees: the entity being written and its
/// about-to-be-committed content (already sparse-merged for updates).
pub struct HookContext<'a> {
    /// Kind of entity being created, updated, or deleted.
    pub kind: EntityKind,
    /// Branch the mutation targets.
    pub branch: &'a BranchName,
    /// Entity id.
    pub id: &'a str,
    /// Proposed content, or `None` for a delete.
    pub content: Option<&'a Json>,
}

/// A single pre-commit check. Mirrors `BaseValidator` from the Python
/// pipeline, minus its async `initialize`/`cleanup` lifecycle — hooks here
/// are plain stateless functions over a shared store, constructed once at
/// service build time.
pub trait ValidationHook: Send + Sync {
    /// Hook name, surfaced in logs and error messages.
    fn name(&self) -> &str;
    /// Run the check; `Err` aborts the pipeline and the pending mutation.
    fn check(&self, ctx: &HookContext<'_>) -> OmsResult<()>;
}

/// An ordered chain of [`ValidationHook`]s, run in registration order.
/// First failure short-circuits the rest (§9C: "short-circuiting on first
/// rejection").
#[derive(Default)]
pub struct HookPipeline {
    hooks: Vec<Box<dyn ValidationHook>>,
}

impl HookPipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        HookPipeline::default()
    }

    /// Append a hook to the end of the chain.
    pub fn register(&mut self, hook: Box<dyn ValidationHook>) {
        self.hooks.push(hook);
    }

    /// Run every registered hook against `ctx`, stopping at the first error.
    pub fn run(&self, ctx: &HookContext<'_>) -> OmsResult<()> {
        for hook in &self.hooks {
            hook.check(ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oms_core::OmsError;

    struct RejectAll;
    impl ValidationHook for RejectAll {
        fn name(&self) -> &str {
            "reject_all"
        }
        fn check(&self, _ctx: &HookContext<'_>) -> OmsResult<()> {
            Err(OmsError::invalid_field("content", "rejected by test hook"))
        }
    }

    fn ctx(branch: &BranchName) -> HookContext<'_> {
        HookContext {
            kind: EntityKind::ObjectType,
            branch,
            id: "Asset",
            content: None,
        }
    }

    #[test]
    fn short_circuits_on_first_rejection() {
        let branch = BranchName::new("main").unwrap();
        let mut pipeline = HookPipeline::new();
        pipeline.register(Box::new(RejectAll));
        assert!(pipeline.run(&ctx(&branch)).is_err());
    }

    #[test]
    fn runs_all_hooks_when_none_reject() {
        let branch = BranchName::new("main").unwrap();
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        struct Wrap(std::sync::Arc<std::sync::atomic::AtomicUsize>);
        impl ValidationHook for Wrap {
            fn name(&self) -> &str {
                "wrap"
            }
            fn check(&self, _ctx: &HookContext<'_>) -> OmsResult<()> {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        }
        let mut pipeline = HookPipeline::new();
        pipeline.register(Box::new(Wrap(counter.clone())));
        pipeline.register(Box::new(Wrap(counter.clone())));
        pipeline.run(&ctx(&branch)).unwrap();
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
