//! Authentication extractors.
//!
//! Every extractor reads the [`CurrentUser`] stored in the session at login.
//! Missing sessions are rejected with 401, wrong roles with 403, both with a
//! JSON `{"error": ...}` body.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use haat_core::UserRole;

use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};

/// Error returned when an extractor rejects the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// No logged-in user.
    Unauthorized,
    /// Logged in with a role that cannot use this endpoint.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => AppError::Unauthorized("Login required".to_owned()),
            Self::Forbidden => {
                AppError::Forbidden("You do not have access to this resource".to_owned())
            }
        }
        .into_response()
    }
}

async fn current_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// Extractor that requires any logged-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts)
            .await
            .map(Self)
            .ok_or(AuthRejection::Unauthorized)
    }
}

/// Extractor that optionally gets the current user.
pub struct OptionalUser(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(parts).await))
    }
}

/// Defines an extractor that only admits users whose role passes `$allowed`.
macro_rules! role_extractor {
    ($(#[$meta:meta])* $name:ident, $allowed:expr) => {
        $(#[$meta])*
        pub struct $name(pub CurrentUser);

        impl<S> FromRequestParts<S> for $name
        where
            S: Send + Sync,
        {
            type Rejection = AuthRejection;

            async fn from_request_parts(
                parts: &mut Parts,
                _state: &S,
            ) -> Result<Self, Self::Rejection> {
                let user = current_user(parts)
                    .await
                    .ok_or(AuthRejection::Unauthorized)?;
                let allowed: fn(UserRole) -> bool = $allowed;
                if !allowed(user.role) {
                    return Err(AuthRejection::Forbidden);
                }
                Ok(Self(user))
            }
        }
    };
}

role_extractor!(
    /// Requires the `admin` role.
    RequireAdmin,
    |role| role == UserRole::Admin
);
role_extractor!(
    /// Requires the `vendor` role. Handlers still check the vendor is approved.
    RequireVendor,
    |role| role == UserRole::Vendor
);
role_extractor!(
    /// Requires the `franchise` role.
    RequireFranchise,
    |role| role == UserRole::Franchise
);
role_extractor!(
    /// Requires the `author` role.
    RequireAuthor,
    |role| role == UserRole::Author
);
role_extractor!(
    /// Requires any staff role (everyone except customers).
    RequireStaff,
    UserRole::is_staff
);

/// Store the logged-in user, issuing a fresh session id.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Clear the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Request, StatusCode};

    use super::*;

    #[test]
    fn test_rejection_status() {
        assert_eq!(
            AuthRejection::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthRejection::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthorized() {
        let (mut parts, ()) = Request::builder().uri("/api/admin/users").body(()).unwrap().into_parts();
        let result = RequireAdmin::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AuthRejection::Unauthorized)));

        let OptionalUser(user) = OptionalUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(user.is_none());
    }
}
