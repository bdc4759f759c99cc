use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use pokebattle_db::MemoryStore;
use pokebattle_kernel::settings::Settings;
use pokebattle_kernel::{Bootstrap, BootstrapReport, VerifyReport};

/// Operator tooling for the pokemon battle database.
#[derive(Debug, Parser)]
#[command(name = "pokebattle", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Authenticate, create the application user and the battle collection.
    Bootstrap {
        /// Rehearse against an empty in-memory instance instead of MongoDB.
        #[arg(long)]
        dry_run: bool,
    },
    /// Check that the application user and an empty collection exist.
    Verify {
        /// Bootstrap an in-memory instance first, then verify it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the resolved settings with passwords redacted.
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load pokebattle settings")?;
    pokebattle_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Bootstrap { dry_run } => {
            let report = if dry_run {
                let mut store = rehearsal_store(&settings);
                Bootstrap::new(&settings.bootstrap).run(&mut store).await?
            } else {
                pokebattle_init::run(&settings).await?
            };
            print_bootstrap(&report);
        }
        Command::Verify { dry_run } => {
            let report = if dry_run {
                let mut store = rehearsal_store(&settings);
                Bootstrap::new(&settings.bootstrap).run(&mut store).await?;
                pokebattle_kernel::verify(&settings.bootstrap, &mut store).await?
            } else {
                pokebattle_init::check(&settings).await?
            };
            print_verify(&report);
            if !report.is_provisioned() {
                bail!(
                    "database '{}' is not provisioned ({} problems)",
                    report.database,
                    report.problems.len()
                );
            }
        }
        Command::Config => {
            let rendered = serde_json::to_string_pretty(&settings.redacted())
                .with_context(|| "failed to render settings")?;
            println!("{rendered}");
        }
    }

    Ok(())
}

/// Empty instance whose only account is the configured administrator.
fn rehearsal_store(settings: &Settings) -> MemoryStore {
    tracing::info!("dry run: using an in-memory instance");
    MemoryStore::with_root(
        &settings.bootstrap.admin_username,
        &settings.bootstrap.admin_password,
    )
}

fn print_bootstrap(report: &BootstrapReport) {
    let steps: Vec<&str> = report.completed.iter().map(|step| step.name()).collect();
    println!(
        "provisioned user '{}' and collection '{}' in database '{}' (steps: {})",
        report.user,
        report.collection,
        report.database,
        steps.join(", ")
    );
}

fn print_verify(report: &VerifyReport) {
    if report.is_provisioned() {
        println!(
            "database '{}' is provisioned: user '{}' has readWrite, collection '{}' is empty",
            report.database, report.user, report.collection
        );
    } else {
        for problem in &report.problems {
            println!("problem: {problem}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn dry_run_flag_parses() {
        let cli = Cli::try_parse_from(["pokebattle", "bootstrap", "--dry-run"]).unwrap();
        assert!(matches!(cli.command, Command::Bootstrap { dry_run: true }));
    }
}
