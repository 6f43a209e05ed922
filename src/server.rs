//! # Server Configuration
//!
//! This module contains the server setup and configuration for the
//! Channels API: shared application state, router assembly and the
//! listener loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use axum::http::HeaderValue;
use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth;
use crate::channels::Registry;
use crate::config::AppConfig;
use crate::crypto::CryptoKey;
use crate::handlers;
use crate::oauth_state::StateSigner;
use crate::telemetry;

const HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub http: reqwest::Client,
    pub registry: Arc<Registry>,
    pub crypto_key: CryptoKey,
    pub state_signer: StateSigner,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: DatabaseConnection) -> anyhow::Result<Self> {
        let key_bytes = config
            .crypto_key
            .clone()
            .ok_or_else(|| anyhow!("crypto key is not configured"))?;
        let crypto_key =
            CryptoKey::new(key_bytes).map_err(|e| anyhow!("invalid crypto key: {}", e))?;

        let secret = config
            .state_signing_secret
            .clone()
            .ok_or_else(|| anyhow!("state signing secret is not configured"))?;
        let max_age_ms = i64::try_from(config.state_max_age_seconds)
            .map_err(|_| anyhow!("state max age out of range"))?
            * 1000;
        let state_signer = StateSigner::new(secret, max_age_ms);

        let http = reqwest::Client::builder()
            .timeout(HTTP_CLIENT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        let registry = Arc::new(Registry::from_config(&config));

        Ok(Self {
            config,
            db: Arc::new(db),
            http,
            registry,
            crypto_key,
            state_signer,
        })
    }

    /// State for router-level unit tests; carries no live database.
    #[cfg(test)]
    pub fn for_tests(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            db: Arc::new(DatabaseConnection::default()),
            http: reqwest::Client::new(),
            registry: Arc::new(Registry::new()),
            crypto_key: CryptoKey::new(vec![0u8; 32]).expect("32-byte key"),
            state_signer: StateSigner::new("test-secret", 600_000),
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    // Dashboard-facing endpoints require an operator bearer token. The
    // callback endpoints stay public: providers redirect browsers to them,
    // and their integrity check is the signed state token.
    let protected = Router::new()
        .route("/connect/{platform}", post(handlers::connect::connect))
        .route(
            "/connections/{user_id}",
            get(handlers::connections::list_connections),
        )
        .route(
            "/connections/{user_id}/{platform}",
            delete(handlers::connections::disconnect),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&config),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/channels", get(handlers::list_channels))
        .route(
            "/callback/{platform}",
            get(handlers::callback::callback_get).post(handlers::callback::callback_post),
        )
        .merge(protected)
        .with_state(state)
        .layer(middleware::from_fn(telemetry::trace_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// CORS restricted to the dashboard origin; falls back to an origin-less
/// policy if the configured origin is not a valid header value.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match config.dashboard_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => cors,
    }
}

/// Starts the server with the given configuration
pub async fn run_server(config: Arc<AppConfig>, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config
        .bind_addr()
        .context("Invalid server bind address")?;
    let profile = config.profile.clone();

    let state = AppState::new(config, db)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::list_channels,
        crate::handlers::connect::connect,
        crate::handlers::callback::callback_get,
        crate::handlers::callback::callback_post,
        crate::handlers::connections::list_connections,
        crate::handlers::connections::disconnect,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthStatus,
            crate::channels::ChannelMetadata,
            crate::handlers::connect::ConnectRequest,
            crate::handlers::connect::ConnectResponse,
            crate::handlers::callback::CallbackBody,
            crate::handlers::callback::CallbackResponse,
            crate::handlers::connections::ConnectionRecord,
            crate::handlers::connections::DisconnectResponse,
            crate::error::ApiError,
        )
    ),
    info(
        title = "Channels API",
        description = "API for connecting customer communication channels",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
