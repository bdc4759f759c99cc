//! Document stores the bootstrap runs against.

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use pokebattle_kernel::settings::DatabaseSettings;

/// Prepare a MongoDB-backed store for the configured deployment.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<MongoStore> {
    let store = MongoStore::new(settings).await?;
    tracing::info!(
        target: "pokebattle-db",
        app_name = %settings.app_name,
        auth_source = %settings.auth_source,
        mechanism = ?settings.auth_mechanism,
        "MongoDB client configured"
    );
    Ok(store)
}
