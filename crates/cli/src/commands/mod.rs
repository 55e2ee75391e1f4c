//! CLI subcommands.

pub mod migrate;
pub mod orders;

use secrecy::SecretString;
use thiserror::Error;

use orderdesk_storefront::config::ConfigError;
use orderdesk_storefront::services::orders::OrderError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Invalid `ORDER_*` configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Order operation rejected.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),
}

/// Storefront database URL, falling back to `DATABASE_URL`.
fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("STOREFRONT_DATABASE_URL"))
}
