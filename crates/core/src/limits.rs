//! Size and count limits enforced at the document-repository boundary.
//!
//! Mirrors the teacher's `strata-core::limits` module: a small struct of
//! `usize` ceilings with sane defaults, checked at the edge rather than
//! threaded through every call.

/// Configurable limits for documents and branch/proposal fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum serialized size of a document's `content`, in bytes.
    pub max_document_bytes: usize,
    /// Maximum number of properties on a single ObjectType or Interface.
    pub max_properties_per_entity: usize,
    /// Maximum number of reviewers on a change proposal.
    pub max_reviewers: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_document_bytes: 1_000_000,
            max_properties_per_entity: 1_000,
            max_reviewers: 50,
        }
    }
}
