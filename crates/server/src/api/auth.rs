//! Authentication endpoints: registration, login, refresh, and the federated
//! login flow (provider redirect + callback).
//!
//! The federated callback is a sequential pipeline of fallible steps -
//! exchange, profile fetch, account resolution, token issuance - where each
//! failure short-circuits with its own error kind. No retries, no fallback
//! between steps.

use crate::AppResources;
use crate::auth::password::generate_state_token;
use crate::auth::resolver::AccountResolver;
use crate::auth::tokens::REFRESH_TOKEN_TTL;
use crate::entity::user::{self, Role};
use crate::error::AuthError;
use crate::providers::Provider;
use axum::{
    Extension, Json,
    extract::{Path, Query},
    http::StatusCode,
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const AUTH_TAG: &str = "Auth";

/// Public projection of a user record, as returned by registration and login.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&user::Model> for PublicUser {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Token pair issued on every successful login, local or federated.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    /// Authorization code returned by the provider.
    pub code: Option<String>,
    /// Opaque state echoed back by the provider.
    pub state: Option<String>,
}

/// Creates the authentication router.
pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(register))
        .routes(routes!(login))
        .routes(routes!(refresh))
        .routes(routes!(provider_redirect))
        .routes(routes!(provider_callback))
}

/// Mint the token pair for a freshly authenticated user and store the refresh
/// token as the single currently-valid one for that user. The overwrite is
/// what invalidates any token from an earlier login.
async fn issue_session(
    resources: &AppResources,
    user: &user::Model,
) -> Result<TokenPairResponse, AuthError> {
    let access_token = resources.keys.issue_access_token(&user.id, user.role)?;
    let refresh_token = resources.keys.issue_refresh_token(user)?;
    resources
        .sessions
        .put(
            &user.id,
            &refresh_token,
            REFRESH_TOKEN_TTL.whole_seconds() as u64,
        )
        .await?;
    Ok(TokenPairResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}

/// Register a local password account.
#[tracing::instrument(skip(resources, body))]
#[utoipa::path(
    post,
    path = "/register",
    tag = AUTH_TAG,
    operation_id = "Register",
    summary = "Register a local password account",
    description = "Creates a user with a hashed password and the default `user` role.\n\n\
                   Requires a non-empty name, a valid email and a password of at least 8 characters.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = PublicUser),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error"),
    )
)]
async fn register(
    Extension(resources): Extension<AppResources>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AuthError> {
    let resolver = AccountResolver::new(resources.db.clone());
    let user = resolver
        .register_local(&body.name, &body.email, &body.password)
        .await?;
    Ok((StatusCode::CREATED, Json(PublicUser::from(&user))))
}

/// Password login.
#[tracing::instrument(skip(resources, body))]
#[utoipa::path(
    post,
    path = "/login",
    tag = AUTH_TAG,
    operation_id = "Login",
    summary = "Authenticate with email and password",
    description = "Verifies the password against the stored hash and issues an access/refresh token pair.\n\n\
                   The refresh token supersedes any previously issued one for this user. Unknown \
                   accounts and wrong passwords produce the same error.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPairResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error"),
    )
)]
async fn login(
    Extension(resources): Extension<AppResources>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenPairResponse>, AuthError> {
    let resolver = AccountResolver::new(resources.db.clone());
    let user = resolver
        .verify_credentials(&body.email, &body.password)
        .await?;
    let pair = issue_session(&resources, &user).await?;
    Ok(Json(pair))
}

/// Exchange a refresh token for a fresh access token.
#[tracing::instrument(skip(resources, body))]
#[utoipa::path(
    post,
    path = "/refresh",
    tag = AUTH_TAG,
    operation_id = "Refresh",
    summary = "Mint a new access token from a refresh token",
    description = "Verifies the refresh token's signature and expiry, then checks it is still the \
                   stored current token for its user; a token superseded by a newer login is \
                   rejected. Does not rotate the refresh token itself.",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 401, description = "Missing, invalid or revoked refresh token"),
        (status = 500, description = "Internal server error"),
    )
)]
async fn refresh(
    Extension(resources): Extension<AppResources>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, AuthError> {
    let presented = body.refresh_token.ok_or(AuthError::MissingToken)?;

    // Cheap local check first; the store round trip only happens for tokens
    // that are at least cryptographically plausible.
    let claims = resources.keys.verify_refresh_token(&presented)?;

    let stored = resources.sessions.get(&claims.sub).await?;
    if stored.as_deref() != Some(presented.as_str()) {
        return Err(AuthError::InvalidOrRevokedToken);
    }

    // Re-read the user so the re-minted token reflects the current role.
    let resolver = AccountResolver::new(resources.db.clone());
    let user = resolver
        .find_by_id(&claims.sub)
        .await?
        .ok_or(AuthError::InvalidOrRevokedToken)?;

    let access_token = resources.keys.issue_access_token(&user.id, user.role)?;
    Ok(Json(AccessTokenResponse { access_token }))
}

/// Redirect to the provider's authorization endpoint.
#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/{provider}",
    tag = AUTH_TAG,
    operation_id = "Federated Login",
    summary = "Start a federated login",
    description = "Redirects the client to the identity provider's authorization endpoint with a \
                   random `state` value.",
    params(
        ("provider" = String, Path, description = "Identity provider name (`google` or `github`)."),
    ),
    responses(
        (status = 303, description = "Redirect to the provider"),
        (status = 400, description = "Unknown or unconfigured provider"),
    )
)]
async fn provider_redirect(
    Extension(resources): Extension<AppResources>,
    Path(provider): Path<String>,
) -> Result<Redirect, AuthError> {
    let provider: Provider = provider.parse()?;
    let client = resources.providers.get(provider)?;
    let state = generate_state_token();
    Ok(Redirect::to(&client.authorize_url(&state)))
}

/// Complete a federated login.
#[tracing::instrument(skip(resources, query))]
#[utoipa::path(
    get,
    path = "/{provider}/callback",
    tag = AUTH_TAG,
    operation_id = "Federated Login Callback",
    summary = "Complete a federated login",
    description = "Exchanges the authorization code, fetches the provider profile, resolves it to \
                   a user account (creating or linking as needed) and issues a token pair.\n\n\
                   A federated email matching an existing local account logs into that same \
                   account.",
    params(
        ("provider" = String, Path, description = "Identity provider name (`google` or `github`)."),
        CallbackQuery,
    ),
    responses(
        (status = 200, description = "Token pair issued", body = TokenPairResponse),
        (status = 400, description = "Missing code or unknown provider"),
        (status = 500, description = "Provider exchange or profile fetch failed"),
    )
)]
async fn provider_callback(
    Extension(resources): Extension<AppResources>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<TokenPairResponse>, AuthError> {
    let provider: Provider = provider.parse()?;
    let client = resources.providers.get(provider)?;
    let code = query
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::InvalidInput("Authorization code missing".into()))?;

    let token = client.exchange_code(code).await?;
    let identity = client.fetch_profile(&token).await?;

    let resolver = AccountResolver::new(resources.db.clone());
    let user = resolver.resolve_federated(&identity).await?;

    let pair = issue_session(&resources, &user).await?;
    Ok(Json(pair))
}
