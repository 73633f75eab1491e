//! Branch name type.
//!
//! Per §3 ("Branch"), a branch name must match `^[a-z][a-z0-9/-]*$` — lowercase,
//! starting with a letter, with `/` and `-` allowed as separators (e.g.
//! `feature/asset-rename`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a branch name.
pub const MAX_BRANCH_NAME_LENGTH: usize = 256;

/// Validated branch name.
///
/// ## Validation Rules
///
/// - Length: 1-256 characters
/// - First character: `[a-z]`
/// - Remaining characters: `[a-z0-9/-]`
///
/// ## Examples
///
/// Valid: `"main"`, `"feature/asset-rename"`, `"_proposals"` is **not** valid
/// under this rule — system branches are constructed via
/// [`BranchName::new_unchecked`] since they use a reserved leading underscore.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchName(String);

/// Error validating a branch name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BranchNameError {
    /// Name is empty.
    #[error("branch name cannot be empty")]
    Empty,
    /// Name exceeds the maximum length.
    #[error("branch name too long: {length} chars (max {max})")]
    TooLong {
        /// Actual length.
        length: usize,
        /// Maximum allowed length.
        max: usize,
    },
    /// First character is not `[a-z]`.
    #[error("branch name must start with a lowercase letter, got '{char}'")]
    InvalidStart {
        /// The offending character.
        char: char,
    },
    /// A character after the first is outside `[a-z0-9/-]`.
    #[error("invalid character '{char}' at position {position} (only a-z, 0-9, '/', '-' allowed)")]
    InvalidChar {
        /// The offending character.
        char: char,
        /// Its byte position.
        position: usize,
    },
}

impl BranchName {
    /// System branches that always exist and are always protected.
    pub const SYSTEM_BRANCHES: [&'static str; 5] =
        ["main", "_system", "_proposals", "_outbox", "_versions"];

    /// Validate and construct a branch name.
    pub fn new(name: impl Into<String>) -> Result<Self, BranchNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(BranchName(name))
    }

    /// Construct a branch name without validation.
    ///
    /// Used for the fixed system branches (`_proposals`, `_outbox`, ...), whose
    /// leading underscore is reserved and would otherwise fail [`Self::validate`].
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        BranchName(name.into())
    }

    /// Validate a candidate branch name against the grammar in §3.
    pub fn validate(name: &str) -> Result<(), BranchNameError> {
        if name.is_empty() {
            return Err(BranchNameError::Empty);
        }
        if name.len() > MAX_BRANCH_NAME_LENGTH {
            return Err(BranchNameError::TooLong {
                length: name.len(),
                max: MAX_BRANCH_NAME_LENGTH,
            });
        }
        // System branches are allowed through unchecked construction only; `validate`
        // enforces the public grammar for user-created branches.
        let mut chars = name.char_indices();
        let (_, first) = chars.next().expect("checked non-empty above");
        if !first.is_ascii_lowercase() {
            return Err(BranchNameError::InvalidStart { char: first });
        }
        for (pos, c) in chars {
            if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '/' || c == '-') {
                return Err(BranchNameError::InvalidChar {
                    char: c,
                    position: pos,
                });
            }
        }
        Ok(())
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this name refers to one of the fixed system branches.
    pub fn is_system(&self) -> bool {
        Self::SYSTEM_BRANCHES.contains(&self.0.as_str())
    }

    /// `main` and the four system branches are always protected (§3); callers
    /// may additionally mark other branches protected via branch state.
    pub fn is_implicitly_protected(&self) -> bool {
        self.is_system()
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_name() {
        assert!(BranchName::new("main").is_ok());
        assert!(BranchName::new("feature/asset-rename").is_ok());
        assert!(BranchName::new("release-42").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(BranchName::new(""), Err(BranchNameError::Empty));
    }

    #[test]
    fn rejects_leading_digit() {
        assert!(matches!(
            BranchName::new("1feature"),
            Err(BranchNameError::InvalidStart { char: '1' })
        ));
    }

    #[test]
    fn rejects_uppercase() {
        assert!(matches!(
            BranchName::new("Main"),
            Err(BranchNameError::InvalidStart { char: 'M' })
        ));
    }

    #[test]
    fn rejects_punctuation_only() {
        assert!(BranchName::new("---").is_err());
    }

    #[test]
    fn system_branches_are_protected() {
        let proposals = BranchName::new_unchecked("_proposals");
        assert!(proposals.is_system());
        assert!(proposals.is_implicitly_protected());
        assert!(!BranchName::new("feature/x").unwrap().is_system());
    }
}
