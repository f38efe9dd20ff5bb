//! Caller identity extracted from request headers.
//!
//! The authenticating gateway in front of this service sets `X-User-ID`.
//! Every invoice operation is scoped to that identity.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

pub const USER_ID_HEADER: &str = "X-User-ID";

/// Longest identity the `created_by` column can hold.
pub const MAX_USER_ID_LEN: usize = 255;

/// Identity of the user making the request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!("Missing X-User-ID header"))
            })?;

        if user_id.chars().count() > MAX_USER_ID_LEN {
            return Err(AppError::AuthError(anyhow::anyhow!(
                "X-User-ID header is too long"
            )));
        }

        tracing::Span::current().record("user_id", user_id);

        Ok(AuthenticatedUser {
            user_id: user_id.to_string(),
        })
    }
}
