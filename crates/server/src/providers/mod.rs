//! Identity provider adapters.
//!
//! Normalizes federated login into a canonical identity tuple, one variant
//! per provider behind the same contract: exchange the authorization code,
//! fetch the profile, emit a [`CanonicalIdentity`]. This layer never touches
//! the user store.

mod github;
mod google;

use crate::config::{ProviderConfig, ProvidersConfig};
use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Known identity providers. An open set at the data-model level (links store
/// the name as text), closed here to the adapters this build ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    GitHub,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::GitHub => "github",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Provider::Google),
            "github" => Ok(Provider::GitHub),
            other => Err(AuthError::InvalidInput(format!(
                "Unknown identity provider: {other}"
            ))),
        }
    }
}

/// Provider-agnostic identity tuple produced by a completed federated login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalIdentity {
    pub email: String,
    pub display_name: String,
    pub provider: Provider,
    /// Provider-scoped subject id.
    pub subject: String,
}

/// Short-lived upstream access token obtained from the code exchange. Only
/// ever used to fetch the profile; never stored.
#[derive(Debug, Clone)]
pub struct ProviderToken {
    pub access_token: String,
}

/// One configured upstream provider: credentials plus an HTTP client.
///
/// Dispatch is a tagged variant over the provider name; both variants share
/// the exchange-then-profile contract.
#[derive(Clone)]
pub struct ProviderClient {
    provider: Provider,
    config: ProviderConfig,
    http: reqwest::Client,
}

impl ProviderClient {
    pub fn new(provider: Provider, config: ProviderConfig) -> Self {
        let http = reqwest::Client::builder()
            // GitHub's API rejects requests without a User-Agent.
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            provider,
            config,
            http,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Build the upstream authorization redirect URL for this provider.
    pub fn authorize_url(&self, state: &str) -> String {
        match self.provider {
            Provider::Google => google::authorize_url(&self.config, state),
            Provider::GitHub => github::authorize_url(&self.config, state),
        }
    }

    /// Exchange an authorization code for an upstream access token.
    pub async fn exchange_code(&self, code: &str) -> Result<ProviderToken, AuthError> {
        match self.provider {
            Provider::Google => google::exchange_code(&self.http, &self.config, code).await,
            Provider::GitHub => github::exchange_code(&self.http, &self.config, code).await,
        }
    }

    /// Fetch the user profile and normalize it. Fails with
    /// [`AuthError::ProviderProfile`] if no email can be obtained; a
    /// federated login without a resolvable email is rejected outright.
    pub async fn fetch_profile(&self, token: &ProviderToken) -> Result<CanonicalIdentity, AuthError> {
        match self.provider {
            Provider::Google => google::fetch_profile(&self.http, &self.config, token).await,
            Provider::GitHub => github::fetch_profile(&self.http, &self.config, token).await,
        }
    }
}

/// The set of providers this deployment is configured for.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    google: Option<ProviderClient>,
    github: Option<ProviderClient>,
}

impl ProviderRegistry {
    pub fn from_config(config: &ProvidersConfig) -> Self {
        Self {
            google: config
                .google
                .clone()
                .map(|c| ProviderClient::new(Provider::Google, c)),
            github: config
                .github
                .clone()
                .map(|c| ProviderClient::new(Provider::GitHub, c)),
        }
    }

    pub fn get(&self, provider: Provider) -> Result<&ProviderClient, AuthError> {
        let client = match provider {
            Provider::Google => self.google.as_ref(),
            Provider::GitHub => self.github.as_ref(),
        };
        client.ok_or_else(|| {
            AuthError::InvalidInput(format!("Identity provider not configured: {provider}"))
        })
    }
}
