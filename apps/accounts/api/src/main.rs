//! Accounts API
//!
//! Serves the user admin site, and bootstraps privileged accounts from the
//! command line.

use axum_helpers::server::{create_app, create_router, health_router};
use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use eyre::{Result, WrapErr};
use migration::Migrator;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[derive(Parser)]
#[command(name = "accounts-api", version)]
#[command(about = "User accounts service and admin site")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations and serve HTTP (default)
    Serve,

    /// Apply pending migrations and exit
    Migrate,

    /// Create a user with staff and superuser access
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Create a user with staff access
    CreateStaffUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    let hasher = config
        .hasher
        .build()
        .wrap_err("Invalid Argon2 parameters")?;

    info!("Connecting to database...");
    let db = database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .wrap_err("PostgreSQL connection failed")?;

    let state = AppState { config, db, hasher };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            migrate(&state).await?;
            serve(state).await?;
        }
        Commands::Migrate => {
            migrate(&state).await?;
            database::postgres::close(state.db).await?;
        }
        Commands::CreateSuperuser { email, password } => {
            let user = api::user_manager(&state)
                .create_superuser(&email, &password)
                .await
                .wrap_err("Failed to create superuser")?;
            info!(user_id = %user.id, email = %user.email, "Superuser created");
            database::postgres::close(state.db).await?;
        }
        Commands::CreateStaffUser { email, password } => {
            let user = api::user_manager(&state)
                .create_staff_user(&email, &password)
                .await
                .wrap_err("Failed to create staff user")?;
            info!(user_id = %user.id, email = %user.email, "Staff user created");
            database::postgres::close(state.db).await?;
        }
    }

    Ok(())
}

async fn migrate(state: &AppState) -> Result<()> {
    database::postgres::run_migrations::<Migrator>(&state.db, state.config.app.name)
        .await
        .wrap_err("Migration failed")
}

async fn serve(state: AppState) -> Result<()> {
    let app = create_router(api::routes(&state))
        .merge(health_router(state.config.app))
        .merge(api::ready_router(state.clone()));

    info!("Starting accounts API");

    let db = state.db.clone();
    create_app(app, &state.config.server, async move {
        info!("Shutting down: closing database connections");
        if let Err(e) = database::postgres::close(db).await {
            tracing::error!("Error closing PostgreSQL: {}", e);
        }
    })
    .await
    .wrap_err("Server error")?;

    info!("Accounts API shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["accounts-api"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_create_superuser_args() {
        let cli = Cli::try_parse_from([
            "accounts-api",
            "create-superuser",
            "--email",
            "admin@example.com",
            "--password",
            "pw123",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::CreateSuperuser { email, password }) => {
                assert_eq!(email, "admin@example.com");
                assert_eq!(password, "pw123");
            }
            _ => panic!("expected create-superuser"),
        }
    }

    #[test]
    fn test_create_staff_user_requires_email() {
        let result = Cli::try_parse_from(["accounts-api", "create-staff-user", "--password", "x"]);
        assert!(result.is_err());
    }
}
