use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::identity::IdentityUser;
use crate::service::ServiceError;
use crate::state::AppState;

/// The authenticated caller, resolved from the `Authorization: Bearer`
/// header against the identity provider.
pub struct AuthUser {
    pub user: IdentityUser,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ServiceError::unauthorized("missing bearer token"))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ServiceError::unauthorized("missing bearer token"))?;

        let user = state.identity.get_user(token).await.map_err(|err| {
            tracing::debug!(
                status = err.status,
                error = err.message.as_str(),
                "token rejected"
            );
            ServiceError::unauthorized("invalid or expired token")
        })?;

        Ok(AuthUser {
            user,
            token: token.to_string(),
        })
    }
}
