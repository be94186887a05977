//! Query-time access predicates.

use std::collections::BTreeSet;

use crate::types::AccessLabel;

/// Set-membership test over access labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Entry is visible iff its label is in the set.
    AnyOf(BTreeSet<AccessLabel>),
    /// No restriction. Only for administrative listing and deletion.
    Unrestricted,
}

impl Predicate {
    /// The labels a requester with `role` may read: `{role, "general"}`.
    ///
    /// Unknown roles are not rejected; a role that is not a valid label
    /// sees only general content.
    #[must_use]
    pub fn for_role(role: &str) -> Self {
        let mut labels = BTreeSet::from([AccessLabel::general()]);
        match AccessLabel::new(role) {
            Ok(label) => {
                labels.insert(label);
            }
            Err(e) => tracing::debug!(role, error = %e, "role is not a valid label"),
        }
        Self::AnyOf(labels)
    }

    /// Matches exactly one label, without the general fallback.
    #[must_use]
    pub fn only(label: AccessLabel) -> Self {
        Self::AnyOf(BTreeSet::from([label]))
    }

    #[must_use]
    pub fn matches(&self, label: &AccessLabel) -> bool {
        match self {
            Self::AnyOf(set) => set.contains(label),
            Self::Unrestricted => true,
        }
    }

    /// The label set, or `None` when unrestricted.
    #[must_use]
    pub fn labels(&self) -> Option<&BTreeSet<AccessLabel>> {
        match self {
            Self::AnyOf(set) => Some(set),
            Self::Unrestricted => None,
        }
    }
}
