//! Token issuer: mints and verifies the access/refresh JWT pair.
//!
//! Access tokens carry `{sub, role}` and live 15 minutes; refresh tokens
//! carry only `{sub}` and live 7 days. The two classes are signed with
//! distinct secrets. Lifetimes are fixed constants, not configurable per
//! call, so the security contract stays uniform across call sites.

use crate::config::TokenConfig;
use crate::entity::user::{self, Role};
use crate::error::AuthError;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Access token lifetime.
pub const ACCESS_TOKEN_TTL: Duration = Duration::minutes(15);
/// Refresh token lifetime.
pub const REFRESH_TOKEN_TTL: Duration = Duration::days(7);

/// Claims embedded in an access token.
///
/// This is the immutable per-request identity produced by the access guard;
/// handlers receive it by value and never share it across requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id.
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

impl AccessClaims {
    /// Role gate: exact membership in the allowed set, no hierarchy. An
    /// `admin` does not satisfy a `user`-only requirement unless listed.
    ///
    /// Must only be called on claims produced by the access guard.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AuthError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

/// Claims embedded in a refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// User id.
    pub sub: String,
    pub exp: usize,
}

/// Signing and verification keys for both token classes, derived from
/// configuration once at startup.
#[derive(Clone)]
pub struct TokenKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl TokenKeys {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
        }
    }

    /// Mint an access token for a user. Also used to re-mint on refresh,
    /// which does not require re-authentication.
    pub fn issue_access_token(&self, user_id: &str, role: Role) -> Result<String, AuthError> {
        let exp = (OffsetDateTime::now_utc() + ACCESS_TOKEN_TTL).unix_timestamp() as usize;
        let claims = AccessClaims {
            sub: user_id.to_string(),
            role,
            exp,
        };
        Ok(encode(&Header::default(), &claims, &self.access_encoding)?)
    }

    /// Mint a refresh token for a user.
    pub fn issue_refresh_token(&self, user: &user::Model) -> Result<String, AuthError> {
        let exp = (OffsetDateTime::now_utc() + REFRESH_TOKEN_TTL).unix_timestamp() as usize;
        let claims = RefreshClaims {
            sub: user.id.clone(),
            exp,
        };
        Ok(encode(&Header::default(), &claims, &self.refresh_encoding)?)
    }

    /// Verify an access token's signature and expiry.
    ///
    /// Any failure (malformed, wrong signature, expired) collapses to
    /// [`AuthError::InvalidOrExpiredToken`].
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        decode::<AccessClaims>(token, &self.access_decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidOrExpiredToken)
    }

    /// Verify a refresh token's signature and expiry. This is the cheap local
    /// check; callers must still compare the token against the session store.
    ///
    /// Failures report as [`AuthError::InvalidOrRevokedToken`], the same as a
    /// superseded token, so the refresh endpoint leaks nothing about why a
    /// token died.
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        decode::<RefreshClaims>(token, &self.refresh_decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidOrRevokedToken)
    }
}
