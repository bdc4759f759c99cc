use anyhow::Context;
use pokebattle_kernel::settings::Settings;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load pokebattle settings")?;
    pokebattle_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        database = %settings.bootstrap.app_database,
        "pokebattle-init bootstrap starting"
    );

    pokebattle_init::run(&settings).await?;
    Ok(())
}
