//! In-process stand-in for a MongoDB deployment.

use std::collections::BTreeMap;

use async_trait::async_trait;

use pokebattle_kernel::{
    BootstrapError, Credential, DocumentStore, NewUser, ResourceKind, RoleGrant,
};

/// Database holding administrative accounts.
pub const ADMIN_DATABASE: &str = "admin";

/// Roles on [`ADMIN_DATABASE`] that may manage users in any database.
const USER_ADMIN_ANY: &[&str] = &["root", "userAdminAnyDatabase"];
/// Roles that may manage users in the database they are scoped to.
const USER_ADMIN: &[&str] = &["userAdmin", "dbOwner"];
/// Roles on [`ADMIN_DATABASE`] that may create collections in any database.
const WRITE_ANY: &[&str] = &["root", "readWriteAnyDatabase", "dbAdminAnyDatabase"];
/// Roles that may create collections in the database they are scoped to.
const WRITE: &[&str] = &["readWrite", "dbAdmin", "dbOwner"];

#[derive(Debug, Clone)]
struct StoredUser {
    password: String,
    roles: Vec<RoleGrant>,
}

#[derive(Debug, Clone, Default)]
struct MemoryDatabase {
    users: BTreeMap<String, StoredUser>,
    /// Collection name to document count.
    collections: BTreeMap<String, u64>,
}

impl MemoryDatabase {
    fn is_empty(&self) -> bool {
        self.users.is_empty() && self.collections.is_empty()
    }
}

/// [`DocumentStore`] keeping users and collections in memory with the same
/// authentication, privilege and duplicate rules a MongoDB server applies.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    databases: BTreeMap<String, MemoryDatabase>,
    session: Option<String>,
    selected: Option<String>,
    unreachable: bool,
}

impl MemoryStore {
    /// An instance with no accounts at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh instance whose only account is a `root` administrator.
    pub fn with_root(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new().with_admin_user(
            username,
            password,
            vec![RoleGrant {
                role: "root".to_string(),
                db: ADMIN_DATABASE.to_string(),
            }],
        )
    }

    /// Add an account to the admin database.
    pub fn with_admin_user(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        roles: Vec<RoleGrant>,
    ) -> Self {
        self.databases
            .entry(ADMIN_DATABASE.to_string())
            .or_default()
            .users
            .insert(
                username.into(),
                StoredUser {
                    password: password.into(),
                    roles,
                },
            );
        self
    }

    /// An instance that cannot be reached; every call fails.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Databases holding at least one user or collection, `admin` included.
    pub fn database_names(&self) -> Vec<&str> {
        self.databases
            .iter()
            .filter(|(_, database)| !database.is_empty())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn collection_names(&self, database: &str) -> Vec<&str> {
        self.databases
            .get(database)
            .map(|db| db.collections.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn user_names(&self, database: &str) -> Vec<&str> {
        self.databases
            .get(database)
            .map(|db| db.users.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether `credential` would log in against `database`.
    pub fn accepts(&self, database: &str, credential: &Credential) -> bool {
        self.databases
            .get(database)
            .and_then(|db| db.users.get(&credential.username))
            .is_some_and(|user| user.password == credential.password)
    }

    /// Simulate application writes into an existing collection.
    pub fn insert_documents(
        &mut self,
        database: &str,
        collection: &str,
        count: u64,
    ) -> Result<(), BootstrapError> {
        let documents = self
            .databases
            .get_mut(database)
            .and_then(|db| db.collections.get_mut(collection))
            .ok_or_else(|| {
                BootstrapError::Database(format!(
                    "collection '{}.{}' does not exist",
                    database, collection
                ))
            })?;
        *documents += count;
        Ok(())
    }

    fn reachable(&self) -> Result<(), BootstrapError> {
        if self.unreachable {
            Err(BootstrapError::Connectivity(
                "no server available at memory://".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Roles of the authenticated account.
    fn session_roles(&self, action: &str) -> Result<&[RoleGrant], BootstrapError> {
        let user = self
            .session
            .as_ref()
            .ok_or_else(|| BootstrapError::privilege(action, "no authenticated session"))?;
        self.databases
            .get(ADMIN_DATABASE)
            .and_then(|db| db.users.get(user))
            .map(|stored| stored.roles.as_slice())
            .ok_or_else(|| BootstrapError::privilege(action, "session user no longer exists"))
    }

    fn authorize(
        &self,
        action: &str,
        database: &str,
        any_roles: &[&str],
        scoped_roles: &[&str],
    ) -> Result<(), BootstrapError> {
        let roles = self.session_roles(action)?;
        let allowed = roles.iter().any(|grant| {
            (grant.db == ADMIN_DATABASE && any_roles.contains(&grant.role.as_str()))
                || (grant.db == database && scoped_roles.contains(&grant.role.as_str()))
        });
        if allowed {
            Ok(())
        } else {
            Err(BootstrapError::privilege(
                action,
                format!(
                    "user '{}' lacks the required role on '{}'",
                    self.session.as_deref().unwrap_or_default(),
                    database
                ),
            ))
        }
    }

    fn selected(&self) -> Result<&str, BootstrapError> {
        self.selected
            .as_deref()
            .ok_or(BootstrapError::NoDatabaseSelected)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn authenticate(&mut self, credential: &Credential) -> Result<(), BootstrapError> {
        self.reachable()?;
        if !self.accepts(ADMIN_DATABASE, credential) {
            return Err(BootstrapError::authentication(
                &credential.username,
                "Authentication failed.",
            ));
        }
        tracing::debug!(user = %credential.username, "memory store session authenticated");
        self.session = Some(credential.username.clone());
        Ok(())
    }

    fn select_database(&mut self, name: &str) {
        self.selected = Some(name.to_string());
    }

    fn selected_database(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    async fn create_user(&mut self, user: &NewUser) -> Result<(), BootstrapError> {
        self.reachable()?;
        let database = self.selected()?.to_string();
        let username = &user.credential.username;
        self.authorize(
            &format!("create user '{}'", username),
            &database,
            USER_ADMIN_ANY,
            USER_ADMIN,
        )?;

        let db = self.databases.entry(database.clone()).or_default();
        if db.users.contains_key(username) {
            return Err(BootstrapError::duplicate(
                ResourceKind::User,
                username,
                database,
            ));
        }
        db.users.insert(
            username.clone(),
            StoredUser {
                password: user.credential.password.clone(),
                roles: user.roles.clone(),
            },
        );
        Ok(())
    }

    async fn create_collection(&mut self, name: &str) -> Result<(), BootstrapError> {
        self.reachable()?;
        let database = self.selected()?.to_string();
        self.authorize(
            &format!("create collection '{}'", name),
            &database,
            WRITE_ANY,
            WRITE,
        )?;

        let db = self.databases.entry(database.clone()).or_default();
        if db.collections.contains_key(name) {
            return Err(BootstrapError::duplicate(
                ResourceKind::Collection,
                name,
                database,
            ));
        }
        db.collections.insert(name.to_string(), 0);
        Ok(())
    }

    async fn user_roles(
        &self,
        username: &str,
    ) -> Result<Option<Vec<RoleGrant>>, BootstrapError> {
        self.reachable()?;
        let database = self.selected()?;
        self.session_roles("inspect users")?;
        Ok(self
            .databases
            .get(database)
            .and_then(|db| db.users.get(username))
            .map(|user| user.roles.clone()))
    }

    async fn document_count(&self, collection: &str) -> Result<Option<u64>, BootstrapError> {
        self.reachable()?;
        let database = self.selected()?;
        self.session_roles("inspect collections")?;
        Ok(self
            .databases
            .get(database)
            .and_then(|db| db.collections.get(collection))
            .copied())
    }
}
