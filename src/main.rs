//! # Formbase API Main Entry Point

use clap::{Parser, Subcommand};
use formbase::{config::ConfigLoader, db::init_pool, server::run_server, telemetry};
use migration::MigratorTrait;

#[derive(Parser)]
#[command(name = "formbase", version, about = "Multi-tenant form-template data platform")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run database migrations and exit
    Migrate,
    /// Start the API server (default)
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load()?;
    telemetry::init_tracing(&config)?;

    if let Ok(redacted_json) = config.redacted_json() {
        tracing::info!(profile = %config.profile, config = %redacted_json, "configuration loaded");
    }

    let db = init_pool(&config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            migration::Migrator::up(&db, None).await?;
            tracing::info!("migrations applied");
            Ok(())
        }
        Command::Serve => {
            migration::Migrator::up(&db, None).await?;
            run_server(config, db).await
        }
    }
}
