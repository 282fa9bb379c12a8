//! Account resolution and credential verification over the persistent store.
//!
//! Maps a canonical identity (local or federated) to a durable user record,
//! creating one when absent and linking federated identities idempotently.
//! Uniqueness (email, provider pair) is enforced at the store; a constraint
//! violation during create/link means another request won the race, so the
//! resolver rereads and uses that row instead of surfacing a failure.

use crate::auth::password::{dummy_verify, hash_password, verify_password};
use crate::entity::user::Role;
use crate::entity::{auth_provider, user};
use crate::error::AuthError;
use crate::providers::CanonicalIdentity;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, SqlErr,
};
use std::sync::Arc;
use time::OffsetDateTime;

/// Lowercased, trimmed form used for storage and lookup.
fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Shallow plausibility check: `local@domain.tld`. Full RFC parsing is not
/// the contract here; the store-level uniqueness constraint is.
fn plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// Registration input checks, rejected before any store access.
pub fn validate_registration(name: &str, email: &str, password: &str) -> Result<(), AuthError> {
    if name.trim().is_empty() {
        return Err(AuthError::InvalidInput("Name is required".into()));
    }
    if !plausible_email(&normalize_email(email)) {
        return Err(AuthError::InvalidInput("A valid email is required".into()));
    }
    if password.len() < 8 {
        return Err(AuthError::InvalidInput(
            "Password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Service for resolving identities to user rows.
#[derive(Clone)]
pub struct AccountResolver {
    db: Arc<DatabaseConnection>,
}

impl AccountResolver {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<user::Model>, AuthError> {
        Ok(user::Entity::find_by_id(id).one(self.db.as_ref()).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, AuthError> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(self.db.as_ref())
            .await?)
    }

    /// Register a local password account.
    ///
    /// Duplicate emails fail with `DuplicateAccount` whether detected by the
    /// pre-check or by the store's uniqueness constraint under a concurrent
    /// double-registration.
    #[tracing::instrument(skip(self, password))]
    pub async fn register_local(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<user::Model, AuthError> {
        validate_registration(name, email, password)?;
        let email = normalize_email(email);

        if self.find_by_email(&email).await?.is_some() {
            return Err(AuthError::DuplicateAccount);
        }

        let password_hash =
            hash_password(password).map_err(|e| AuthError::Hashing(e.to_string()))?;

        let account = user::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            name: Set(name.trim().to_string()),
            email: Set(email),
            password_hash: Set(Some(password_hash)),
            role: Set(Role::User),
            created_at: Set(OffsetDateTime::now_utc()),
        };

        match account.insert(self.db.as_ref()).await {
            Ok(created) => {
                tracing::info!(user_id = %created.id, "registered local account");
                Ok(created)
            }
            Err(e) if is_unique_violation(&e) => Err(AuthError::DuplicateAccount),
            Err(e) => Err(e.into()),
        }
    }

    /// Verify password credentials against the stored hash.
    ///
    /// Unknown email, federated-only account and wrong password are
    /// indistinguishable to the caller: same error, same timing class. The
    /// no-hash paths still burn a full Argon2 verification.
    #[tracing::instrument(skip(self, password))]
    pub async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<user::Model, AuthError> {
        let Some(account) = self.find_by_email(email).await? else {
            dummy_verify(password);
            return Err(AuthError::InvalidCredentials);
        };

        let Some(hash) = account.password_hash.as_deref() else {
            dummy_verify(password);
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, hash) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(account)
    }

    /// Resolve a federated identity to a user, creating and linking as
    /// needed.
    ///
    /// Lookup order: provider pair first (fast path for returning federated
    /// users), then email. An email match against an existing local account
    /// links the federated identity to that same user id - one person, merged
    /// login methods - rather than creating a duplicate.
    #[tracing::instrument(skip(self, identity), fields(provider = %identity.provider, subject = %identity.subject))]
    pub async fn resolve_federated(
        &self,
        identity: &CanonicalIdentity,
    ) -> Result<user::Model, AuthError> {
        if let Some(link) = auth_provider::Entity::find()
            .filter(auth_provider::Column::Provider.eq(identity.provider.as_str()))
            .filter(auth_provider::Column::Subject.eq(identity.subject.as_str()))
            .one(self.db.as_ref())
            .await?
        {
            return user::Entity::find_by_id(&link.user_id)
                .one(self.db.as_ref())
                .await?
                .ok_or_else(|| {
                    AuthError::Store(DbErr::RecordNotFound(format!(
                        "user {} referenced by identity link is missing",
                        link.user_id
                    )))
                });
        }

        let account = match self.find_by_email(&identity.email).await? {
            Some(existing) => existing,
            None => self.create_federated_user(identity).await?,
        };

        self.link_identity(&account.id, identity).await?;
        Ok(account)
    }

    async fn create_federated_user(
        &self,
        identity: &CanonicalIdentity,
    ) -> Result<user::Model, AuthError> {
        let email = normalize_email(&identity.email);
        let account = user::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            name: Set(identity.display_name.clone()),
            email: Set(email.clone()),
            password_hash: Set(None),
            role: Set(Role::User),
            created_at: Set(OffsetDateTime::now_utc()),
        };

        match account.insert(self.db.as_ref()).await {
            Ok(created) => {
                tracing::info!(user_id = %created.id, provider = %identity.provider, "created federated account");
                Ok(created)
            }
            // Someone else just created this email - reread and use that row.
            Err(e) if is_unique_violation(&e) => {
                self.find_by_email(&email).await?.ok_or_else(|| {
                    AuthError::Store(DbErr::RecordNotFound(format!(
                        "user with email {email} vanished after conflicting insert"
                    )))
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert the `(provider, subject)` link. Idempotent: a concurrent or
    /// repeated link of the same pair is a no-op, not an error.
    async fn link_identity(
        &self,
        user_id: &str,
        identity: &CanonicalIdentity,
    ) -> Result<(), AuthError> {
        let link = auth_provider::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            user_id: Set(user_id.to_string()),
            provider: Set(identity.provider.as_str().to_string()),
            subject: Set(identity.subject.clone()),
            created_at: Set(OffsetDateTime::now_utc()),
        };

        match link.insert(self.db.as_ref()).await {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Update the display name. The only profile field this core mutates.
    pub async fn update_name(&self, id: &str, name: &str) -> Result<user::Model, AuthError> {
        let Some(account) = self.find_by_id(id).await? else {
            return Err(AuthError::Store(DbErr::RecordNotFound(format!(
                "user {id} not found"
            ))));
        };
        let mut active: user::ActiveModel = account.into();
        active.name = Set(name.trim().to_string());
        Ok(active.update(self.db.as_ref()).await?)
    }

    /// Admin listing of all users.
    pub async fn list_users(&self) -> Result<Vec<user::Model>, AuthError> {
        Ok(user::Entity::find().all(self.db.as_ref()).await?)
    }
}
