//! Credential-and-token issuance service.
//!
//! Authenticates users via password or third-party identity providers
//! (OAuth2 authorization-code flow), issues short-lived access tokens and
//! longer-lived refresh tokens, and enforces role-based access on protected
//! resources.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::session::SessionStore;
use crate::auth::tokens::TokenKeys;
use crate::config::AppConfig;
use crate::providers::ProviderRegistry;

pub mod api;
pub mod auth;
pub mod config;
pub mod entity;
pub mod error;
pub mod providers;

/// Shared per-process resources, attached to the router as an extension.
#[derive(Clone)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub sessions: Arc<dyn SessionStore>,
    pub keys: Arc<TokenKeys>,
    pub providers: Arc<ProviderRegistry>,
    pub config: Arc<AppConfig>,
}
