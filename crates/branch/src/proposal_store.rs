//! In-memory store for [`ChangeProposal`]s.
//!
//! Proposals are review-workflow state, not versioned ontology content, so
//! unlike `ObjectType`/`Property` documents they are not run through
//! `oms-store::VersionStore` — they have no branch history of their own to
//! time-travel over. A `DashMap` keyed by proposal id is the teacher's usual
//! shape for this kind of auxiliary registry (see `VersionStore::commits`).

use dashmap::DashMap;
use oms_core::ProposalId;

use crate::types::ChangeProposal;

/// Concurrent registry of change proposals.
#[derive(Default)]
pub struct ProposalStore {
    proposals: DashMap<ProposalId, ChangeProposal>,
}

impl ProposalStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a proposal.
    pub fn put(&self, proposal: ChangeProposal) {
        self.proposals.insert(proposal.id.clone(), proposal);
    }

    /// Fetch a proposal by id.
    pub fn get(&self, id: &str) -> Option<ChangeProposal> {
        self.proposals.get(id).map(|p| p.value().clone())
    }

    /// List every proposal, most recently created first.
    pub fn list(&self) -> Vec<ChangeProposal> {
        let mut all: Vec<ChangeProposal> = self.proposals.iter().map(|p| p.value().clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    /// Mutate a proposal in place, returning the updated copy.
    pub fn update<F: FnOnce(&mut ChangeProposal)>(&self, id: &str, f: F) -> Option<ChangeProposal> {
        let mut entry = self.proposals.get_mut(id)?;
        f(&mut entry);
        Some(entry.clone())
    }
}
