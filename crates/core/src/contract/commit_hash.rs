//! Content address of a commit.

use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

/// A commit's content hash, hex-encoded `xxh3_128`.
///
/// Per §4.1, the hash must be deterministic over
/// `(sorted-changes, parents, author, message, timestamp)`. `xxh3` is not
/// cryptographic, which is fine here: the hash is a dedup/addressing key, not
/// a security boundary (the store never accepts an attacker-chosen hash as
/// input — it always computes its own).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitHash([u8; 16]);

impl CommitHash {
    /// Hash arbitrary pre-serialized commit bytes.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Xxh3::new();
        hasher.update(bytes);
        CommitHash(hasher.digest128().to_le_bytes())
    }

    /// The all-zero hash, used as the "no parent" sentinel for a repository's
    /// first commit on a branch.
    pub fn nil() -> Self {
        CommitHash([0u8; 16])
    }

    /// Whether this is the nil hash.
    pub fn is_nil(&self) -> bool {
        self.0 == [0u8; 16]
    }

    /// Parse from the hex form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 16];
        for i in 0..16 {
            bytes[i] = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(CommitHash(bytes))
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitHash({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = CommitHash::of(b"hello");
        let b = CommitHash::of(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn roundtrips_through_display() {
        let h = CommitHash::of(b"payload");
        let s = h.to_string();
        assert_eq!(CommitHash::parse(&s), Some(h));
    }

    #[test]
    fn nil_is_distinct() {
        assert_ne!(CommitHash::nil(), CommitHash::of(b""));
        assert!(CommitHash::nil().is_nil());
    }
}
