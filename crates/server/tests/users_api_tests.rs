//! HTTP tests for the access guard and role gate on the user endpoints.

use axum_test::TestServer;
use gatehouse::{
    AppResources,
    api::app,
    auth::{MemorySessionStore, SessionStore, TokenKeys, tokens::AccessClaims},
    config::{AppConfig, ProvidersConfig, TokenConfig},
    entity::user::Role,
    providers::ProviderRegistry,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use serde_json::{Value, json};
use std::sync::Arc;
use time::OffsetDateTime;

const ACCESS_SECRET: &str = "test-access-secret-0123456789abcdef";

async fn create_test_db() -> DatabaseConnection {
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

    db
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        redis_url: "redis://localhost:6379/0".into(),
        listen_addr: "127.0.0.1:0".into(),
        tokens: TokenConfig {
            access_secret: ACCESS_SECRET.into(),
            refresh_secret: "test-refresh-secret-0123456789abcde".into(),
        },
        providers: ProvidersConfig::default(),
    }
}

async fn test_resources() -> AppResources {
    let config = Arc::new(test_config());
    let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    AppResources {
        db: Arc::new(create_test_db().await),
        sessions,
        keys: Arc::new(TokenKeys::new(&config.tokens)),
        providers: Arc::new(ProviderRegistry::from_config(&config.providers)),
        config,
    }
}

/// Register and log in, returning the access token.
async fn login_user(server: &TestServer, name: &str, email: &str) -> String {
    server
        .post("/auth/register")
        .json(&json!({ "name": name, "email": email, "password": "longpass1" }))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
    let login: Value = server
        .post("/auth/login")
        .json(&json!({ "email": email, "password": "longpass1" }))
        .await
        .json();
    login["accessToken"].as_str().expect("access token").into()
}

#[tokio::test]
async fn me_requires_a_token() {
    let server = TestServer::new(app(test_resources().await)).expect("test server");

    let response = server.get("/users/me").await;
    response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"], "Access token missing");
}

#[tokio::test]
async fn me_rejects_garbage_and_wrong_scheme_tokens() {
    let server = TestServer::new(app(test_resources().await)).expect("test server");

    // Present but unverifiable: 403, distinct from the missing-token 401.
    let response = server.get("/users/me").authorization_bearer("garbage").await;
    response.assert_status(axum::http::StatusCode::FORBIDDEN);

    // A non-Bearer scheme yields no usable token at all.
    let response = server
        .get("/users/me")
        .add_header(
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        )
        .await;
    response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_rejects_expired_token_with_valid_signature() {
    let resources = test_resources().await;
    let server = TestServer::new(app(resources)).expect("test server");

    let exp = (OffsetDateTime::now_utc() - time::Duration::hours(2)).unix_timestamp() as usize;
    let claims = AccessClaims {
        sub: "someone".into(),
        role: Role::User,
        exp,
    };
    let expired = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(ACCESS_SECRET.as_bytes()),
    )
    .expect("encode");

    let response = server.get("/users/me").authorization_bearer(&expired).await;
    response.assert_status(axum::http::StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid or expired access token");
}

#[tokio::test]
async fn me_returns_the_full_profile() {
    let server = TestServer::new(app(test_resources().await)).expect("test server");
    let token = login_user(&server, "A", "a@x.com").await;

    let response = server.get("/users/me").authorization_bearer(&token).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["name"], "A");
    assert_eq!(body["email"], "a@x.com");
    assert_eq!(body["role"], "user");
    assert!(body["created_at"].as_str().is_some());
}

#[tokio::test]
async fn patch_me_updates_the_display_name() {
    let server = TestServer::new(app(test_resources().await)).expect("test server");
    let token = login_user(&server, "A", "a@x.com").await;

    let response = server
        .patch("/users/me")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Renamed" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["name"], "Renamed");

    // The change is durable.
    let me: Value = server
        .get("/users/me")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(me["name"], "Renamed");
}

#[tokio::test]
async fn patch_me_requires_a_name() {
    let server = TestServer::new(app(test_resources().await)).expect("test server");
    let token = login_user(&server, "A", "a@x.com").await;

    for body in [json!({}), json!({ "name": "" }), json!({ "name": "   " })] {
        let response = server
            .patch("/users/me")
            .authorization_bearer(&token)
            .json(&body)
            .await;
        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn user_role_cannot_list_users() {
    let server = TestServer::new(app(test_resources().await)).expect("test server");
    let token = login_user(&server, "A", "a@x.com").await;

    let response = server.get("/users").authorization_bearer(&token).await;
    response.assert_status(axum::http::StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"], "Access denied: insufficient permissions");
}

#[tokio::test]
async fn admin_role_can_list_users() {
    let resources = test_resources().await;
    let server = TestServer::new(app(resources.clone())).expect("test server");

    login_user(&server, "A", "a@x.com").await;
    login_user(&server, "B", "b@x.com").await;

    // Promote B out of band; role changes are an external admin action.
    resources
        .db
        .execute(Statement::from_string(
            DbBackend::Sqlite,
            r#"UPDATE users SET role = 'admin' WHERE email = 'b@x.com';"#,
        ))
        .await
        .expect("promote user");

    // Tokens embed the role at issuance, so B logs in again for admin claims.
    let login: Value = server
        .post("/auth/login")
        .json(&json!({ "email": "b@x.com", "password": "longpass1" }))
        .await
        .json();
    let admin_token = login["accessToken"].as_str().expect("access token");

    let response = server.get("/users").authorization_bearer(admin_token).await;
    response.assert_status_ok();

    let body: Value = response.json();
    let listed = body.as_array().expect("array of users");
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|u| u.get("password_hash").is_none()));
}
