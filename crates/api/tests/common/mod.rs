//! Common test utilities for integration tests.
//!
//! These suites run against a real PostgreSQL database. Set
//! `TEST_DATABASE_URL` to enable them; without it every test returns early
//! so `cargo test` stays green on machines without a database.

// Helper utilities shared across suites; not every suite uses all of them.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use fake::{faker::internet::en::SafeEmail, Fake};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use borrower_portal_api::app::create_app;
use borrower_portal_api::config::{
    AuthConfig, Config, CrmConfig, DatabaseConfig, LoggingConfig, SecurityConfig, ServerConfig,
    TokensConfig,
};

/// Auth provider's test signing key. Stands in for the provider, which the
/// service itself never is.
pub const TEST_PRIVATE_KEY: &str =
    include_str!("../../../shared/testdata/identity_test_key.pem");
pub const TEST_PUBLIC_KEY: &str =
    include_str!("../../../shared/testdata/identity_test_key.pub.pem");

/// Connect to the test database, or `None` when `TEST_DATABASE_URL` is not
/// configured.
pub async fn try_test_pool() -> Option<PgPool> {
    let database_url = std::env::var("TEST_DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    Some(pool)
}

/// Test configuration wired to the embedded test keypair.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        },
        database: DatabaseConfig {
            url: std::env::var("TEST_DATABASE_URL").unwrap_or_default(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 10,
            idle_timeout_secs: 600,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            cors_origins: vec![],
        },
        auth: AuthConfig {
            public_key: TEST_PUBLIC_KEY.to_string(),
            leeway_secs: 30,
        },
        crm: CrmConfig::default(),
        tokens: TokensConfig::default(),
    }
}

/// Create a test application router.
pub fn create_test_app(config: Config, pool: PgPool) -> Router {
    create_app(config, pool).expect("Failed to build test app")
}

/// Mint a provider-style bearer token for a test subject.
pub fn mint_bearer(subject_id: &str, email: Option<&str>) -> String {
    shared::jwt::sign_identity_token(TEST_PRIVATE_KEY, subject_id, email, 3600)
        .expect("Failed to sign test identity token")
}

/// Unique ids so concurrent test runs never collide.
pub fn unique_subject() -> String {
    format!("auth0|test_{}", Uuid::new_v4().simple())
}

pub fn unique_contact() -> String {
    format!("003TEST{}", &Uuid::new_v4().simple().to_string()[..12])
}

pub fn unique_account() -> String {
    format!("001TEST{}", &Uuid::new_v4().simple().to_string()[..12])
}

pub fn fake_email() -> String {
    SafeEmail().fake()
}

/// Seed an invitation token and return its value.
pub async fn seed_invitation(
    pool: &PgPool,
    contact_id: &str,
    account_id: &str,
    expires_at: DateTime<Utc>,
) -> String {
    let token = shared::token::generate_invitation_token();
    persistence::repositories::InvitationTokenRepository::new(pool.clone())
        .create(&token, contact_id, account_id, &fake_email(), expires_at)
        .await
        .expect("Failed to seed invitation token");
    token
}

/// Seed an unexpired invitation token.
pub async fn seed_fresh_invitation(pool: &PgPool, contact_id: &str, account_id: &str) -> String {
    seed_invitation(pool, contact_id, account_id, Utc::now() + Duration::days(14)).await
}

/// Seed a referral token and return its value.
pub async fn seed_referral(
    pool: &PgPool,
    owner_contact_id: &str,
    max_uses: i32,
    expires_at: DateTime<Utc>,
) -> String {
    let token = shared::token::generate_referral_token();
    persistence::repositories::ReferralTokenRepository::new(pool.clone())
        .create(&token, owner_contact_id, max_uses, expires_at)
        .await
        .expect("Failed to seed referral token");
    token
}

/// Build an unauthenticated JSON request.
pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

/// Build an authenticated JSON request.
pub fn json_request_with_bearer(
    method: Method,
    uri: &str,
    body: Value,
    bearer: &str,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

/// Build an authenticated GET request.
pub fn get_request_with_bearer(uri: &str, bearer: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
        .body(Body::empty())
        .expect("Failed to build request")
}

/// Parse a JSON response body, asserting the expected status first.
pub async fn parse_body(response: Response, expected_status: StatusCode) -> Value {
    assert_eq!(response.status(), expected_status);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    serde_json::from_slice(&bytes).expect("Response body is not valid JSON")
}
