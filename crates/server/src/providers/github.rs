//! GitHub OAuth2 adapter.
//!
//! GitHub does not return the email on the user object for most accounts, so
//! the profile fetch also hits `/user/emails` and applies the selection
//! policy: prefer the address flagged primary, else the first returned.

use super::{CanonicalIdentity, Provider, ProviderToken};
use crate::config::ProviderConfig;
use crate::error::AuthError;
use serde::{Deserialize, Serialize};

const AUTH_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";
const EMAILS_URL: &str = "https://api.github.com/user/emails";

pub(super) fn authorize_url(config: &ProviderConfig, state: &str) -> String {
    let base = config.auth_url.as_deref().unwrap_or(AUTH_URL);
    format!(
        "{base}?client_id={}&redirect_uri={}&scope={}&state={}",
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode("user:email"),
        urlencoding::encode(state),
    )
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub(super) async fn exchange_code(
    http: &reqwest::Client,
    config: &ProviderConfig,
    code: &str,
) -> Result<ProviderToken, AuthError> {
    let url = config.token_url.as_deref().unwrap_or(TOKEN_URL);
    let response = http
        .post(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .json(&TokenRequest {
            client_id: &config.client_id,
            client_secret: &config.client_secret,
            code,
        })
        .send()
        .await
        .map_err(|e| AuthError::ProviderExchange(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AuthError::ProviderExchange(format!(
            "github token endpoint returned {}",
            response.status()
        )));
    }

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| AuthError::ProviderExchange(e.to_string()))?;
    Ok(ProviderToken {
        access_token: body.access_token,
    })
}

#[derive(Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
}

#[derive(Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
}

pub(super) async fn fetch_profile(
    http: &reqwest::Client,
    config: &ProviderConfig,
    token: &ProviderToken,
) -> Result<CanonicalIdentity, AuthError> {
    let user_url = config.userinfo_url.as_deref().unwrap_or(USER_URL);
    let response = http
        .get(user_url)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(|e| AuthError::ProviderProfile(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AuthError::ProviderProfile(format!(
            "github user endpoint returned {}",
            response.status()
        )));
    }

    let user: GithubUser = response
        .json()
        .await
        .map_err(|e| AuthError::ProviderProfile(e.to_string()))?;

    let emails_url = config.emails_url.as_deref().unwrap_or(EMAILS_URL);
    let response = http
        .get(emails_url)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(|e| AuthError::ProviderProfile(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AuthError::ProviderProfile(format!(
            "github emails endpoint returned {}",
            response.status()
        )));
    }

    let emails: Vec<GithubEmail> = response
        .json()
        .await
        .map_err(|e| AuthError::ProviderProfile(e.to_string()))?;

    let email = emails
        .iter()
        .find(|e| e.primary)
        .or_else(|| emails.first())
        .map(|e| e.email.clone())
        .ok_or_else(|| AuthError::ProviderProfile("no email in github profile".into()))?;

    let display_name = user
        .name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| user.login.clone());

    Ok(CanonicalIdentity {
        email,
        display_name,
        provider: Provider::GitHub,
        subject: user.id.to_string(),
    })
}
