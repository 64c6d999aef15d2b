//! `ledsense` binary: the LED and obstacle-sensor state API.
//!
//! # Startup Sequence
//!
//! 1. Parse the command line
//! 2. Load layered configuration
//! 3. Initialize structured logging (tracing)
//! 4. Create the `PostgreSQL` pool and apply migrations
//! 5. Run the chosen command: serve the API, or create a user
//! 6. Close the pool

mod cli;
mod error;
mod settings;

use std::sync::Arc;

use clap::Parser;
use ledsense_api::{AppState, TokenKeys, hash_password, shutdown_signal, start_server};
use ledsense_db::{DeviceStore, PgDeviceStore, PostgresPool};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::AppError;
use crate::settings::{LogFormat, LoggingSettings, Settings};

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the database, or the server fails.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;
    init_tracing(&settings.logging);

    info!(
        host = settings.server.host,
        port = settings.server.port,
        max_connections = settings.database.max_connections,
        protect_endpoints = settings.auth.protect_endpoints,
        "ledsense starting"
    );

    let pool = PostgresPool::connect(&settings.database.url, &settings.database.pool_limits())?;
    if settings.database.run_migrations {
        pool.run_migrations().await?;
    }
    let store = Arc::new(PgDeviceStore::new(&pool));

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&settings, store).await,
        Command::CreateUser { nombre, password } => create_user(&*store, &nombre, &password).await,
    };

    pool.close().await;
    result
}

fn init_tracing(logging: &LoggingSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn serve(settings: &Settings, store: Arc<PgDeviceStore>) -> Result<(), AppError> {
    let tokens = TokenKeys::new(&settings.auth.secret, settings.auth.token_ttl_hours)?;
    let state = Arc::new(
        AppState::new(store, tokens).with_protected_endpoints(settings.auth.protect_endpoints),
    );

    start_server(&settings.server.server_config(), state, shutdown_signal()).await?;
    Ok(())
}

async fn create_user(
    store: &dyn DeviceStore,
    nombre: &str,
    password: &str,
) -> Result<(), AppError> {
    if nombre.is_empty() || password.is_empty() {
        return Err(AppError::Argument {
            message: String::from("user name and password must not be empty"),
        });
    }

    let hash = hash_password(password)?;
    let id = store.create_user(nombre, &hash).await?;
    info!(id, usuario = nombre, "User created");
    println!("{id}");
    Ok(())
}
