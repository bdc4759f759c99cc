use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BootstrapError;

/// Built-in role granting read and write access to one database.
pub const READ_WRITE_ROLE: &str = "readWrite";

/// Username/password pair used to authenticate or to create a user.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A role granted to a user, scoped to one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: String,
    pub db: String,
}

impl RoleGrant {
    pub fn read_write(db: impl Into<String>) -> Self {
        Self {
            role: READ_WRITE_ROLE.to_string(),
            db: db.into(),
        }
    }
}

/// User to register in the currently selected database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub credential: Credential,
    pub roles: Vec<RoleGrant>,
}

/// Session against a document database service.
///
/// Implementations hold one connection for their whole lifetime. Creation
/// calls require a prior successful [`authenticate`](Self::authenticate) and a
/// selected database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Establish an authenticated session.
    async fn authenticate(&mut self, credential: &Credential) -> Result<(), BootstrapError>;

    /// Switch the working database. Never fails on its own.
    fn select_database(&mut self, name: &str);

    /// Name of the working database, if one was selected.
    fn selected_database(&self) -> Option<&str>;

    /// Register a user in the working database.
    async fn create_user(&mut self, user: &NewUser) -> Result<(), BootstrapError>;

    /// Create an empty collection in the working database.
    async fn create_collection(&mut self, name: &str) -> Result<(), BootstrapError>;

    /// Role grants of a user in the working database, `None` if no such user.
    async fn user_roles(&self, username: &str) -> Result<Option<Vec<RoleGrant>>, BootstrapError>;

    /// Number of documents in a collection, `None` if it does not exist.
    async fn document_count(&self, collection: &str) -> Result<Option<u64>, BootstrapError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_hides_password() {
        let credential = Credential::new("root", "rootpass");
        let printed = format!("{credential:?}");
        assert!(printed.contains("root"));
        assert!(!printed.contains("rootpass"));
    }

    #[test]
    fn read_write_grant_serializes_like_a_role_document() {
        let grant = RoleGrant::read_write("pokemon");
        assert_eq!(
            serde_json::to_value(&grant).unwrap(),
            serde_json::json!({ "role": "readWrite", "db": "pokemon" })
        );
    }
}
