use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use shared::jwt::IdentityVerifier;

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, security_headers_middleware, trace_id};
use crate::routes::{health, identity, invitations, referrals};
use crate::services::CrmClient;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub verifier: IdentityVerifier,
    pub crm: Arc<CrmClient>,
}

pub fn create_app(config: Config, pool: PgPool) -> Result<Router, shared::jwt::JwtError> {
    let config = Arc::new(config);

    let verifier = IdentityVerifier::from_rsa_pem(&config.auth.public_key, config.auth.leeway_secs)?;
    let crm = Arc::new(CrmClient::from_config(&config.crm));

    let state = AppState {
        pool,
        config: config.clone(),
        verifier,
        crm,
    };

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        // Production: only allow specified origins
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Identity routes. Auth is enforced by the extractor on each handler;
    // session takes optional auth so anonymous calls resolve to a typed
    // outcome instead of a bare 401.
    let identity_routes = Router::new()
        .route("/api/v1/identity/mapping", get(identity::get_mapping))
        .route("/api/v1/identity/link", post(identity::link_identity))
        .route("/api/v1/identity/session", post(identity::bootstrap_session))
        .route("/api/v1/identity/profile", get(identity::get_profile));

    // Token routes. Validation endpoints are public: the pre-login banner
    // and the referral landing page run before any identity exists.
    let token_routes = Router::new()
        .route(
            "/api/v1/tokens/invitation/validate",
            post(invitations::validate_invitation),
        )
        .route(
            "/api/v1/tokens/referral/validate",
            post(referrals::validate_referral),
        )
        .route(
            "/api/v1/tokens/referral/consume",
            post(referrals::consume_referral),
        )
        .route("/api/v1/tokens/referral", post(referrals::create_referral_token));

    // Public operational routes
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    // Merge all routes
    let router = Router::new()
        .merge(public_routes)
        .merge(identity_routes)
        .merge(token_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state);

    Ok(router)
}
