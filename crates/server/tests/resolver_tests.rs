//! Account resolver tests: creation, linking, merging and duplicate races.

use gatehouse::auth::resolver::AccountResolver;
use gatehouse::entity::{auth_provider, user};
use gatehouse::error::AuthError;
use gatehouse::providers::{CanonicalIdentity, Provider};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, EntityTrait, Statement};
use std::sync::Arc;

async fn create_test_db() -> Arc<DatabaseConnection> {
    // A single pooled connection keeps every query on the same in-memory
    // database.
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    let db = Database::connect(options).await.expect("connect");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            created_at TEXT NOT NULL
        );"#,
    ))
    .await
    .expect("create users table");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE auth_providers (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            provider TEXT NOT NULL,
            subject TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(provider, subject)
        );"#,
    ))
    .await
    .expect("create auth_providers table");

    Arc::new(db)
}

fn github_identity(email: &str, subject: &str) -> CanonicalIdentity {
    CanonicalIdentity {
        email: email.into(),
        display_name: "Octo Cat".into(),
        provider: Provider::GitHub,
        subject: subject.into(),
    }
}

#[tokio::test]
async fn federated_login_creates_a_passwordless_account() {
    let db = create_test_db().await;
    let resolver = AccountResolver::new(db.clone());

    let account = resolver
        .resolve_federated(&github_identity("octo@x.com", "12345"))
        .await
        .expect("resolve");

    assert_eq!(account.email, "octo@x.com");
    assert_eq!(account.name, "Octo Cat");
    assert!(account.password_hash.is_none());

    let links = auth_provider::Entity::find()
        .all(db.as_ref())
        .await
        .expect("links");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].user_id, account.id);
    assert_eq!(links[0].provider, "github");
    assert_eq!(links[0].subject, "12345");
}

#[tokio::test]
async fn returning_federated_login_resolves_to_the_same_user() {
    let db = create_test_db().await;
    let resolver = AccountResolver::new(db.clone());
    let identity = github_identity("octo@x.com", "12345");

    let first = resolver.resolve_federated(&identity).await.expect("first");
    let second = resolver.resolve_federated(&identity).await.expect("second");
    assert_eq!(first.id, second.id);

    // No duplicate users, no duplicate links.
    assert_eq!(user::Entity::find().all(db.as_ref()).await.unwrap().len(), 1);
    assert_eq!(
        auth_provider::Entity::find()
            .all(db.as_ref())
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn federated_email_match_links_to_the_local_account() {
    let db = create_test_db().await;
    let resolver = AccountResolver::new(db.clone());

    let local = resolver
        .register_local("A", "a@x.com", "longpass1")
        .await
        .expect("register");

    // Same email from a provider: merge login methods, don't duplicate.
    let federated = resolver
        .resolve_federated(&github_identity("a@x.com", "999"))
        .await
        .expect("resolve");
    assert_eq!(federated.id, local.id);

    // Password login still works on the merged account.
    let verified = resolver
        .verify_credentials("a@x.com", "longpass1")
        .await
        .expect("verify");
    assert_eq!(verified.id, local.id);

    assert_eq!(user::Entity::find().all(db.as_ref()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn federated_email_is_case_normalized_when_matching() {
    let db = create_test_db().await;
    let resolver = AccountResolver::new(db.clone());

    let local = resolver
        .register_local("A", "a@x.com", "longpass1")
        .await
        .expect("register");

    let federated = resolver
        .resolve_federated(&github_identity("A@X.COM", "999"))
        .await
        .expect("resolve");
    assert_eq!(federated.id, local.id);
}

#[tokio::test]
async fn concurrent_double_registration_yields_one_success() {
    let db = create_test_db().await;
    let resolver = AccountResolver::new(db.clone());

    let (a, b) = tokio::join!(
        resolver.register_local("A", "race@x.com", "longpass1"),
        resolver.register_local("A", "race@x.com", "longpass1"),
    );

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for result in [a, b] {
        if let Err(e) = result {
            assert!(matches!(e, AuthError::DuplicateAccount));
        }
    }
    assert_eq!(user::Entity::find().all(db.as_ref()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_federated_resolution_converges_on_one_user() {
    let db = create_test_db().await;
    let resolver = AccountResolver::new(db.clone());
    let identity = github_identity("octo@x.com", "12345");

    let (a, b) = tokio::join!(
        resolver.resolve_federated(&identity),
        resolver.resolve_federated(&identity),
    );

    // A lost uniqueness race is rereading, not an error: both calls succeed
    // and agree on the user.
    let a = a.expect("first resolution");
    let b = b.expect("second resolution");
    assert_eq!(a.id, b.id);

    assert_eq!(user::Entity::find().all(db.as_ref()).await.unwrap().len(), 1);
    assert_eq!(
        auth_provider::Entity::find()
            .all(db.as_ref())
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn credential_failures_are_uniform() {
    let db = create_test_db().await;
    let resolver = AccountResolver::new(db.clone());

    resolver
        .register_local("A", "a@x.com", "longpass1")
        .await
        .expect("register");
    resolver
        .resolve_federated(&github_identity("fed@x.com", "777"))
        .await
        .expect("resolve");

    // Unknown account, wrong password and federated-only account all fail
    // with the same variant.
    for (email, password) in [
        ("nobody@x.com", "longpass1"),
        ("a@x.com", "wrong-password"),
        ("fed@x.com", "longpass1"),
    ] {
        let result = resolver.verify_credentials(email, password).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }
}

#[tokio::test]
async fn two_providers_can_link_to_one_account() {
    let db = create_test_db().await;
    let resolver = AccountResolver::new(db.clone());

    let via_github = resolver
        .resolve_federated(&github_identity("one@x.com", "12345"))
        .await
        .expect("github");
    let via_google = resolver
        .resolve_federated(&CanonicalIdentity {
            email: "one@x.com".into(),
            display_name: "Octo Cat".into(),
            provider: Provider::Google,
            subject: "g-9".into(),
        })
        .await
        .expect("google");

    assert_eq!(via_github.id, via_google.id);
    assert_eq!(
        auth_provider::Entity::find()
            .all(db.as_ref())
            .await
            .unwrap()
            .len(),
        2
    );
}
