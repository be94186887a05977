//! Mapping authenticated users to the role used for retrieval filtering.

use std::collections::BTreeMap;

use crate::error::RagError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub role: String,
}

/// Resolves a username to its principal.
///
/// Authentication happens before this point; implementations only look up
/// the role and reject users they do not know.
pub trait PrincipalResolver: Send + Sync {
    /// # Errors
    ///
    /// Returns [`RagError::UnknownPrincipal`] for users without a role.
    fn resolve(&self, username: &str) -> Result<Principal, RagError>;
}

/// Fixed username to role table, usually read from `[principals]`.
#[derive(Debug, Clone, Default)]
pub struct StaticPrincipals {
    roles: BTreeMap<String, String>,
}

impl StaticPrincipals {
    #[must_use]
    pub fn new(roles: BTreeMap<String, String>) -> Self {
        Self { roles }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl PrincipalResolver for StaticPrincipals {
    fn resolve(&self, username: &str) -> Result<Principal, RagError> {
        let username = username.trim();
        self.roles
            .get(username)
            .map(|role| Principal {
                username: username.to_owned(),
                role: role.clone(),
            })
            .ok_or_else(|| RagError::UnknownPrincipal(username.to_owned()))
    }
}
