//! Failure taxonomy for provisioning against a document database.

use std::fmt;

use thiserror::Error;

/// Kind of resource a duplicate-resource failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    User,
    Collection,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::User => f.write_str("user"),
            ResourceKind::Collection => f.write_str("collection"),
        }
    }
}

/// Errors raised by a [`DocumentStore`](crate::store::DocumentStore) or by the
/// provisioning sequence itself. None of them are recovered from.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("authentication failed for user '{user}': {reason}")]
    Authentication { user: String, reason: String },

    #[error("not authorized to {action}: {reason}")]
    Privilege { action: String, reason: String },

    #[error("{kind} '{name}' already exists in database '{database}'")]
    Duplicate {
        kind: ResourceKind,
        name: String,
        database: String,
    },

    #[error("database service unreachable: {0}")]
    Connectivity(String),

    #[error("required setting '{0}' is missing or empty")]
    MissingSetting(&'static str),

    #[error("no database selected for the session")]
    NoDatabaseSelected,

    #[error("database error: {0}")]
    Database(String),
}

impl BootstrapError {
    pub fn authentication(user: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Authentication {
            user: user.into(),
            reason: reason.into(),
        }
    }

    pub fn privilege(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Privilege {
            action: action.into(),
            reason: reason.into(),
        }
    }

    pub fn duplicate(
        kind: ResourceKind,
        name: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self::Duplicate {
            kind,
            name: name.into(),
            database: database.into(),
        }
    }

    /// True when the failure means the resource was already provisioned.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}
