//! Staff account commands.
//!
//! ```bash
//! haat-cli admin create -e admin@example.com -n "Admin Name" -p 'long passphrase'
//! ```
//!
//! This is how the first admin gets in. Every later staff account can be
//! created from the admin API.

use haat_core::UserRole;
use haat_server::services::auth::{AuthError, AuthService};

use super::{CommandError, connect};

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create an admin account with a password login.
///
/// # Errors
///
/// Returns an error if the email is invalid or taken, the password is too
/// short, or the database is unreachable.
pub async fn create_user(email: &str, name: &str, password: &str) -> Result<(), AdminError> {
    let pool = connect().await?;

    let user = AuthService::new(&pool)
        .create_staff(name, email, password, UserRole::Admin)
        .await?;

    tracing::info!(user_id = %user.id, email = %email, "Admin user created");
    Ok(())
}
