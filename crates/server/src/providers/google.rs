//! Google OAuth2 adapter.

use super::{CanonicalIdentity, Provider, ProviderToken};
use crate::config::ProviderConfig;
use crate::error::AuthError;
use serde::{Deserialize, Serialize};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

pub(super) fn authorize_url(config: &ProviderConfig, state: &str) -> String {
    let base = config.auth_url.as_deref().unwrap_or(AUTH_URL);
    format!(
        "{base}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode("openid email profile"),
        urlencoding::encode(state),
    )
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'a str,
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
        .json(&TokenRequest {
            code,
            client_id: &config.client_id,
            client_secret: &config.client_secret,
            redirect_uri: &config.redirect_uri,
            grant_type: "authorization_code",
        })
        .send()
        .await
        .map_err(|e| AuthError::ProviderExchange(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AuthError::ProviderExchange(format!(
            "google token endpoint returned {}",
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
struct UserInfo {
    id: String,
    email: Option<String>,
    name: Option<String>,
}

pub(super) async fn fetch_profile(
    http: &reqwest::Client,
    config: &ProviderConfig,
    token: &ProviderToken,
) -> Result<CanonicalIdentity, AuthError> {
    let url = config.userinfo_url.as_deref().unwrap_or(USERINFO_URL);
    let response = http
        .get(url)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(|e| AuthError::ProviderProfile(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AuthError::ProviderProfile(format!(
            "google userinfo endpoint returned {}",
            response.status()
        )));
    }

    let info: UserInfo = response
        .json()
        .await
        .map_err(|e| AuthError::ProviderProfile(e.to_string()))?;

    let email = info
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AuthError::ProviderProfile("no email in google profile".into()))?;
    let display_name = info.name.filter(|n| !n.is_empty()).unwrap_or_else(|| email.clone());

    Ok(CanonicalIdentity {
        email,
        display_name,
        provider: Provider::Google,
        subject: info.id,
    })
}
