//! Read-only inspection of a provisioned database.

use anyhow::Context;

use crate::bootstrap::require_admin;
use crate::settings::BootstrapSettings;
use crate::store::{DocumentStore, RoleGrant};

/// What was found in the application database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub database: String,
    pub user: String,
    pub collection: String,
    /// Grants held by the application user, `None` if the user is missing.
    pub user_roles: Option<Vec<RoleGrant>>,
    /// Documents in the collection, `None` if the collection is missing.
    pub collection_documents: Option<u64>,
    pub problems: Vec<String>,
}

impl VerifyReport {
    pub fn is_provisioned(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Check that the application user holds exactly one `readWrite` grant on the
/// role database and that the collection exists and is empty.
///
/// A wrong end state is reported through [`VerifyReport::problems`]; only
/// session failures are returned as errors.
pub async fn verify<S>(
    settings: &BootstrapSettings,
    store: &mut S,
) -> anyhow::Result<VerifyReport>
where
    S: DocumentStore + ?Sized,
{
    let admin = settings.admin_credential();
    require_admin(&admin).with_context(|| "verification could not authenticate")?;
    store
        .authenticate(&admin)
        .await
        .with_context(|| "verification could not authenticate")?;
    store.select_database(&settings.app_database);

    let user_roles = store
        .user_roles(&settings.app_username)
        .await
        .with_context(|| format!("failed to read roles of user '{}'", settings.app_username))?;
    let collection_documents = store
        .document_count(&settings.collection)
        .await
        .with_context(|| format!("failed to inspect collection '{}'", settings.collection))?;

    let mut problems = Vec::new();
    let expected = vec![RoleGrant::read_write(settings.role_database())];
    match &user_roles {
        None => problems.push(format!(
            "user '{}' does not exist in database '{}'",
            settings.app_username, settings.app_database
        )),
        Some(roles) if *roles != expected => problems.push(format!(
            "user '{}' has roles {:?}, expected exactly {:?}",
            settings.app_username, roles, expected
        )),
        Some(_) => {}
    }
    match collection_documents {
        None => problems.push(format!(
            "collection '{}' does not exist in database '{}'",
            settings.collection, settings.app_database
        )),
        Some(0) => {}
        Some(count) => problems.push(format!(
            "collection '{}' holds {} documents, expected none",
            settings.collection, count
        )),
    }

    for problem in &problems {
        tracing::warn!(database = %settings.app_database, "{}", problem);
    }

    Ok(VerifyReport {
        database: settings.app_database.clone(),
        user: settings.app_username.clone(),
        collection: settings.collection.clone(),
        user_roles,
        collection_documents,
        problems,
    })
}
