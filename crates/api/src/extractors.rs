//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use qa_common::AppError;
use qa_db::entities::user::{self, UserRole};

fn refuse_inactive(user: user::Model) -> Result<user::Model, AppError> {
    if user.is_active {
        Ok(user)
    } else {
        Err(AppError::Forbidden("Account is deactivated".to_string()))
    }
}

/// Authenticated, active user extractor.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the auth middleware
        let user = parts
            .extensions
            .get::<user::Model>()
            .cloned()
            .ok_or(AppError::Unauthorized)?;
        refuse_inactive(user).map(AuthUser)
    }
}

/// Optional authenticated user extractor.
///
/// A token for a deactivated user is still refused rather than treated as
/// anonymous.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<user::Model>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<user::Model>()
            .cloned()
            .map(refuse_inactive)
            .transpose()
            .map(Self)
    }
}

/// Active user with the `admin` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub user::Model);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if user.role == UserRole::Admin {
            Ok(Self(user))
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }
}
