use anyhow::Context;
use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::{self, ClientOptions};
use mongodb::{Client, Database};

use pokebattle_kernel::settings::{AuthMechanism, DatabaseSettings};
use pokebattle_kernel::{
    BootstrapError, Credential, DocumentStore, NewUser, ResourceKind, RoleGrant,
};

const UNAUTHORIZED: i32 = 13;
const AUTHENTICATION_FAILED: i32 = 18;
const NAMESPACE_EXISTS: i32 = 48;
const DUPLICATE_KEY: i32 = 11000;
const USER_ALREADY_EXISTS: i32 = 51003;

/// [`DocumentStore`] backed by a MongoDB deployment.
///
/// The client is only built once [`authenticate`](DocumentStore::authenticate)
/// supplies a credential, so every later command runs as that user.
pub struct MongoStore {
    options: ClientOptions,
    auth_source: String,
    mechanism: AuthMechanism,
    client: Option<Client>,
    session_user: String,
    selected: Option<String>,
}

impl MongoStore {
    /// Parse the connection settings. No connection is made until
    /// authentication.
    pub async fn new(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let mut options = ClientOptions::parse(settings.uri.as_str())
            .await
            .with_context(|| "failed to parse MongoDB connection string")?;
        options.app_name = Some(settings.app_name.clone());
        // Credentials embedded in the URI would bypass the administrative login.
        options.credential = None;

        Ok(Self {
            options,
            auth_source: settings.auth_source.clone(),
            mechanism: settings.auth_mechanism,
            client: None,
            session_user: String::new(),
            selected: None,
        })
    }

    fn database(&self) -> Result<Database, BootstrapError> {
        let client = self.client.as_ref().ok_or_else(|| {
            BootstrapError::privilege("run commands", "no authenticated session")
        })?;
        let name = self
            .selected
            .as_deref()
            .ok_or(BootstrapError::NoDatabaseSelected)?;
        Ok(client.database(name))
    }

    fn classify(&self, error: MongoError, operation: Operation<'_>) -> BootstrapError {
        let database = self.selected.as_deref().unwrap_or_default();
        classify(error, operation, &self.session_user, database)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn authenticate(&mut self, credential: &Credential) -> Result<(), BootstrapError> {
        let mut client_options = self.options.clone();
        client_options.credential = Some(
            options::Credential::builder()
                .username(credential.username.clone())
                .password(credential.password.clone())
                .source(self.auth_source.clone())
                .mechanism(driver_mechanism(self.mechanism))
                .build(),
        );

        let username = credential.username.as_str();
        let client = Client::with_options(client_options)
            .map_err(|error| classify(error, Operation::Authenticate, username, ""))?;

        // The driver connects lazily; ping forces the handshake and SASL login.
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|error| classify(error, Operation::Authenticate, username, ""))?;

        tracing::info!(
            target: "pokebattle-db",
            user = %credential.username,
            auth_source = %self.auth_source,
            "authenticated against MongoDB"
        );

        self.client = Some(client);
        self.session_user = credential.username.clone();
        Ok(())
    }

    fn select_database(&mut self, name: &str) {
        tracing::debug!(target: "pokebattle-db", database = name, "selected database");
        self.selected = Some(name.to_string());
    }

    fn selected_database(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    async fn create_user(&mut self, user: &NewUser) -> Result<(), BootstrapError> {
        let database = self.database()?;
        let username = user.credential.username.as_str();

        database
            .run_command(create_user_command(user))
            .await
            .map_err(|error| self.classify(error, Operation::CreateUser { name: username }))?;

        tracing::info!(
            target: "pokebattle-db",
            user = username,
            database = %database.name(),
            roles = ?user.roles,
            "created user"
        );
        Ok(())
    }

    async fn create_collection(&mut self, name: &str) -> Result<(), BootstrapError> {
        let database = self.database()?;

        // Newer servers accept createCollection on an existing namespace with
        // identical options; an existing collection must still be fatal here.
        let existing = database
            .list_collection_names()
            .filter(doc! { "name": name })
            .await
            .map_err(|error| self.classify(error, Operation::CreateCollection { name }))?;
        if !existing.is_empty() {
            return Err(BootstrapError::duplicate(
                ResourceKind::Collection,
                name,
                database.name(),
            ));
        }

        database
            .create_collection(name)
            .await
            .map_err(|error| self.classify(error, Operation::CreateCollection { name }))?;

        tracing::info!(
            target: "pokebattle-db",
            collection = name,
            database = %database.name(),
            "created collection"
        );
        Ok(())
    }

    async fn user_roles(
        &self,
        username: &str,
    ) -> Result<Option<Vec<RoleGrant>>, BootstrapError> {
        let database = self.database()?;
        let reply = database
            .run_command(doc! { "usersInfo": username })
            .await
            .map_err(|error| self.classify(error, Operation::Inspect))?;

        parse_users_info(&reply)
    }

    async fn document_count(&self, collection: &str) -> Result<Option<u64>, BootstrapError> {
        let database = self.database()?;
        let existing = database
            .list_collection_names()
            .filter(doc! { "name": collection })
            .await
            .map_err(|error| self.classify(error, Operation::Inspect))?;
        if existing.is_empty() {
            return Ok(None);
        }

        let count = database
            .collection::<Document>(collection)
            .count_documents(doc! {})
            .await
            .map_err(|error| self.classify(error, Operation::Inspect))?;
        Ok(Some(count))
    }
}

/// Command registering `user` in the database it is run against.
pub fn create_user_command(user: &NewUser) -> Document {
    let roles: Vec<Bson> = user
        .roles
        .iter()
        .map(|grant| {
            Bson::Document(doc! {
                "role": grant.role.as_str(),
                "db": grant.db.as_str(),
            })
        })
        .collect();

    doc! {
        "createUser": user.credential.username.as_str(),
        "pwd": user.credential.password.as_str(),
        "roles": roles,
    }
}

/// Extract the role grants of the first user in a `usersInfo` reply.
fn parse_users_info(reply: &Document) -> Result<Option<Vec<RoleGrant>>, BootstrapError> {
    let users = reply.get_array("users").map_err(malformed)?;
    let Some(user) = users.iter().find_map(Bson::as_document) else {
        return Ok(None);
    };

    let roles = user
        .get_array("roles")
        .map_err(malformed)?
        .iter()
        .filter_map(Bson::as_document)
        .map(|role| {
            Ok(RoleGrant {
                role: role.get_str("role").map_err(malformed)?.to_string(),
                db: role.get_str("db").map_err(malformed)?.to_string(),
            })
        })
        .collect::<Result<Vec<_>, BootstrapError>>()?;

    Ok(Some(roles))
}

fn malformed(error: impl std::fmt::Display) -> BootstrapError {
    BootstrapError::Database(format!("malformed usersInfo reply: {}", error))
}

fn driver_mechanism(mechanism: AuthMechanism) -> options::AuthMechanism {
    match mechanism {
        AuthMechanism::ScramSha1 => options::AuthMechanism::ScramSha1,
        AuthMechanism::ScramSha256 => options::AuthMechanism::ScramSha256,
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation<'a> {
    Authenticate,
    CreateUser { name: &'a str },
    CreateCollection { name: &'a str },
    Inspect,
}

impl Operation<'_> {
    fn action(&self) -> String {
        match self {
            Operation::Authenticate => "authenticate".to_string(),
            Operation::CreateUser { name } => format!("create user '{}'", name),
            Operation::CreateCollection { name } => format!("create collection '{}'", name),
            Operation::Inspect => "inspect the database".to_string(),
        }
    }
}

fn classify(
    error: MongoError,
    operation: Operation<'_>,
    user: &str,
    database: &str,
) -> BootstrapError {
    match error.kind.as_ref() {
        ErrorKind::Authentication { message, .. } => {
            BootstrapError::authentication(user, message)
        }
        ErrorKind::ServerSelection { message, .. } => {
            BootstrapError::Connectivity(message.clone())
        }
        ErrorKind::Io(io) => BootstrapError::Connectivity(io.to_string()),
        ErrorKind::Command(command) => match (command.code, operation) {
            (AUTHENTICATION_FAILED, _) => BootstrapError::authentication(user, &command.message),
            (UNAUTHORIZED, _) => BootstrapError::privilege(operation.action(), &command.message),
            (DUPLICATE_KEY | USER_ALREADY_EXISTS, Operation::CreateUser { name }) => {
                BootstrapError::duplicate(ResourceKind::User, name, database)
            }
            (NAMESPACE_EXISTS, Operation::CreateCollection { name }) => {
                BootstrapError::duplicate(ResourceKind::Collection, name, database)
            }
            _ => BootstrapError::Database(format!(
                "{} failed: {} ({})",
                operation.action(),
                command.message,
                command.code_name
            )),
        },
        _ => BootstrapError::Database(format!("{} failed: {}", operation.action(), error)),
    }
}
