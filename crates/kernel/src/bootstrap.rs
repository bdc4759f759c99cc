use std::fmt;

use anyhow::Context;

use crate::error::BootstrapError;
use crate::settings::BootstrapSettings;
use crate::store::{Credential, DocumentStore};

/// One provisioning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Authenticate,
    SelectDatabase,
    CreateUser,
    CreateCollection,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Authenticate => "authenticate",
            Step::SelectDatabase => "select_database",
            Step::CreateUser => "create_user",
            Step::CreateCollection => "create_collection",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Steps in execution order. Each one depends on the session or database
/// context established by the one before it.
pub const STEP_ORDER: &[Step] = &[
    Step::Authenticate,
    Step::SelectDatabase,
    Step::CreateUser,
    Step::CreateCollection,
];

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub database: String,
    pub user: String,
    pub collection: String,
    pub completed: Vec<Step>,
}

/// Runs the provisioning sequence against an injected store.
pub struct Bootstrap<'a> {
    settings: &'a BootstrapSettings,
}

impl<'a> Bootstrap<'a> {
    pub fn new(settings: &'a BootstrapSettings) -> Self {
        Self { settings }
    }

    /// Execute every step of [`STEP_ORDER`], stopping at the first failure.
    ///
    /// Nothing is rolled back: steps completed before a failure stay applied.
    /// The returned error carries the failing step as context and a
    /// [`BootstrapError`] as its root cause.
    pub async fn run<S>(&self, store: &mut S) -> anyhow::Result<BootstrapReport>
    where
        S: DocumentStore + ?Sized,
    {
        tracing::info!(
            database = %self.settings.app_database,
            "running bootstrap steps in order: {:?}",
            STEP_ORDER
        );

        let mut completed = Vec::with_capacity(STEP_ORDER.len());
        for &step in STEP_ORDER {
            tracing::info!(step = step.name(), "running bootstrap step");

            self.run_step(step, store)
                .await
                .with_context(|| format!("bootstrap step '{}' failed", step))?;

            completed.push(step);
        }

        let report = BootstrapReport {
            database: self.settings.app_database.clone(),
            user: self.settings.app_username.clone(),
            collection: self.settings.collection.clone(),
            completed,
        };

        tracing::info!(
            database = %report.database,
            user = %report.user,
            collection = %report.collection,
            "bootstrap complete"
        );

        Ok(report)
    }

    async fn run_step<S>(&self, step: Step, store: &mut S) -> Result<(), BootstrapError>
    where
        S: DocumentStore + ?Sized,
    {
        let settings = self.settings;
        match step {
            Step::Authenticate => {
                let admin = settings.admin_credential();
                require_admin(&admin)?;
                store.authenticate(&admin).await
            }
            Step::SelectDatabase => {
                store.select_database(&settings.app_database);
                Ok(())
            }
            Step::CreateUser => {
                require(&settings.app_username, "app_username")?;
                require(&settings.app_password, "app_password")?;
                require(&settings.app_database, "app_database")?;

                let user = settings.app_user();
                if settings.role_database() != settings.app_database {
                    tracing::warn!(
                        database = %settings.app_database,
                        role_database = %settings.role_database(),
                        "readWrite grant is scoped to a different database than the one selected"
                    );
                }
                store.create_user(&user).await
            }
            Step::CreateCollection => {
                require(&settings.collection, "collection")?;
                store.create_collection(&settings.collection).await
            }
        }
    }
}

/// Reject an administrative credential with an empty username or password
/// before it reaches the store.
pub(crate) fn require_admin(admin: &Credential) -> Result<(), BootstrapError> {
    if admin.username.is_empty() {
        return Err(BootstrapError::authentication(
            "",
            "administrative username is empty",
        ));
    }
    if admin.password.is_empty() {
        return Err(BootstrapError::authentication(
            &admin.username,
            "administrative password is empty",
        ));
    }
    Ok(())
}

fn require(value: &str, setting: &'static str) -> Result<(), BootstrapError> {
    if value.is_empty() {
        Err(BootstrapError::MissingSetting(setting))
    } else {
        Ok(())
    }
}
