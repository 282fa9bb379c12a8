//! Error taxonomy for the authentication core.
//!
//! Every fallible path in the service funnels into [`AuthError`], which maps
//! onto the HTTP surface as a JSON `{"error": "..."}` body. Store and
//! upstream-provider failures are logged with full detail server-side but
//! surface to clients as opaque messages.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or missing request fields, rejected before any store access.
    #[error("{0}")]
    InvalidInput(String),
    /// Unknown account or wrong password. Deliberately a single variant so
    /// the response cannot be used for account enumeration.
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("User already exists")]
    DuplicateAccount,
    #[error("Access token missing")]
    MissingToken,
    #[error("Invalid or expired access token")]
    InvalidOrExpiredToken,
    /// Refresh-specific: the presented token failed verification, or is no
    /// longer the stored current token for its user (superseded by a newer
    /// login, or absent).
    #[error("Invalid or revoked refresh token")]
    InvalidOrRevokedToken,
    #[error("Access denied: insufficient permissions")]
    Forbidden,
    #[error("Provider code exchange failed: {0}")]
    ProviderExchange(String),
    #[error("Provider profile fetch failed: {0}")]
    ProviderProfile(String),
    #[error("Token encoding failed: {0}")]
    TokenEncoding(#[from] jsonwebtoken::errors::Error),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Database error: {0}")]
    Store(#[from] sea_orm::DbErr),
    #[error("Session store error: {0}")]
    Session(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::InvalidOrRevokedToken => StatusCode::UNAUTHORIZED,
            AuthError::InvalidOrExpiredToken | AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::DuplicateAccount => StatusCode::CONFLICT,
            AuthError::ProviderExchange(_)
            | AuthError::ProviderProfile(_)
            | AuthError::TokenEncoding(_)
            | AuthError::Hashing(_)
            | AuthError::Store(_)
            | AuthError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message exposed to clients. Internal failures collapse to opaque
    /// strings; the detail only goes to the log.
    fn public_message(&self) -> String {
        match self {
            AuthError::ProviderExchange(_) | AuthError::ProviderProfile(_) => {
                "OAuth authentication failed".to_string()
            }
            AuthError::TokenEncoding(_)
            | AuthError::Hashing(_)
            | AuthError::Store(_)
            | AuthError::Session(_) => "Server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
