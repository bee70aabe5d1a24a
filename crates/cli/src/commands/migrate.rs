//! Database migration command.
//!
//! ```bash
//! haat-cli migrate
//! ```
//!
//! Applies `crates/server/migrations/` and creates the session table used
//! by the server.

use super::{CommandError, connect};

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session store error: {0}")]
    SessionStore(#[from] sqlx::Error),
}

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the connection or any migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    haat_server::middleware::migrate_session_store(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
