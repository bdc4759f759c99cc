//! Pokebattle database initialization.
//!
//! Wires the layered settings, the MongoDB store and the ordered bootstrap
//! together for the container entrypoint and the operator CLI.

use pokebattle_kernel::settings::Settings;
use pokebattle_kernel::{Bootstrap, BootstrapReport, VerifyReport};

/// Provision the application database against the configured MongoDB
/// deployment.
pub async fn run(settings: &Settings) -> anyhow::Result<BootstrapReport> {
    let mut store = pokebattle_db::connect(&settings.database).await?;
    Bootstrap::new(&settings.bootstrap).run(&mut store).await
}

/// Inspect the configured MongoDB deployment for the provisioned end state.
pub async fn check(settings: &Settings) -> anyhow::Result<VerifyReport> {
    let mut store = pokebattle_db::connect(&settings.database).await?;
    pokebattle_kernel::verify(&settings.bootstrap, &mut store).await
}
