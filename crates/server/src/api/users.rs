//! User profile endpoints.
//!
//! All routes here sit behind the access guard; the listing additionally
//! passes through the role gate.

use crate::AppResources;
use crate::api::auth::PublicUser;
use crate::auth::extract::AuthUser;
use crate::auth::resolver::AccountResolver;
use crate::entity::user::{self, Role};
use crate::error::AuthError;
use axum::{Extension, Json};
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const USERS_TAG: &str = "Users";

/// Full profile projection, including the creation timestamp.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<user::Model> for UserProfile {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
}

/// Creates the users router.
pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(me, update_me))
        .routes(routes!(list_users))
}

fn missing_row(id: &str) -> AuthError {
    // Users are never hard-deleted, so a verified token pointing at no row
    // means the store is inconsistent.
    AuthError::Store(DbErr::RecordNotFound(format!("user {id} not found")))
}

/// Current user's profile.
#[tracing::instrument(skip(resources, claims))]
#[utoipa::path(
    get,
    path = "/me",
    tag = USERS_TAG,
    operation_id = "Get Profile",
    summary = "Fetch the authenticated user's profile",
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "The caller's profile", body = UserProfile),
        (status = 401, description = "Access token missing"),
        (status = 403, description = "Invalid or expired access token"),
    )
)]
async fn me(
    Extension(resources): Extension<AppResources>,
    AuthUser(claims): AuthUser,
) -> Result<Json<UserProfile>, AuthError> {
    let resolver = AccountResolver::new(resources.db.clone());
    let user = resolver
        .find_by_id(&claims.sub)
        .await?
        .ok_or_else(|| missing_row(&claims.sub))?;
    Ok(Json(UserProfile::from(user)))
}

/// Update the current user's display name.
#[tracing::instrument(skip(resources, claims, body))]
#[utoipa::path(
    patch,
    path = "/me",
    tag = USERS_TAG,
    operation_id = "Update Profile",
    summary = "Update the authenticated user's display name",
    security(("Authorization" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = PublicUser),
        (status = 400, description = "Name missing or empty"),
        (status = 401, description = "Access token missing"),
        (status = 403, description = "Invalid or expired access token"),
    )
)]
async fn update_me(
    Extension(resources): Extension<AppResources>,
    AuthUser(claims): AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    let name = body
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AuthError::InvalidInput("Name is required".into()))?;

    let resolver = AccountResolver::new(resources.db.clone());
    let user = resolver.update_name(&claims.sub, name).await?;
    Ok(Json(PublicUser::from(&user)))
}

/// Admin-only listing of all users.
#[tracing::instrument(skip(resources, claims))]
#[utoipa::path(
    get,
    path = "/",
    tag = USERS_TAG,
    operation_id = "List Users",
    summary = "List all users (admin only)",
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "All user profiles", body = [UserProfile]),
        (status = 401, description = "Access token missing"),
        (status = 403, description = "Invalid token or insufficient role"),
    )
)]
async fn list_users(
    Extension(resources): Extension<AppResources>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Vec<UserProfile>>, AuthError> {
    claims.require_role(&[Role::Admin])?;

    let resolver = AccountResolver::new(resources.db.clone());
    let users = resolver.list_users().await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}
