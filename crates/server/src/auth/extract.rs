//! Access guard: authentication extractor for protected routes.
//!
//! Verification is purely cryptographic (signature + expiry) against the
//! access-token secret; no store round trip. The resulting claims are a
//! request-scoped value handed to the handler, never cached across requests.

use crate::AppResources;
use crate::auth::tokens::AccessClaims;
use crate::error::AuthError;
use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};

/// Axum extractor that validates `Authorization: Bearer <token>` against the
/// access-token secret.
///
/// Absence of a usable bearer token fails with `MissingToken` (401);
/// a present-but-bad token fails with `InvalidOrExpiredToken` (403). The
/// distinction is preserved for client retry logic.
///
/// # Example
///
/// ```ignore
/// async fn handler(AuthUser(claims): AuthUser) -> impl IntoResponse {
///     format!("hello, {}", claims.sub)
/// }
/// ```
pub struct AuthUser(pub AccessClaims);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let resources = parts
            .extensions
            .get::<AppResources>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("AppResources not found in extensions");
                AuthError::Session("application resources unavailable".into())
            })?;

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or(AuthError::MissingToken)?;

        let claims = resources.keys.verify_access_token(token)?;
        Ok(AuthUser(claims))
    }
}
