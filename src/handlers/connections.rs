//! Connection status handlers
//!
//! Dashboard-facing read and disconnect endpoints. Disconnects are logical:
//! token material is nulled and the status row flipped, but both rows remain
//! for audit history.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

use crate::auth::OperatorAuth;
use crate::automation::WebhookRegistrar;
use crate::error::ApiError;
use crate::models::channel_connection;
use crate::repositories::{
    ConnectionStatusRepository, CredentialRepository, WebhookRepository,
};
use crate::server::AppState;

/// A channel connection as shown to the dashboard
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionRecord {
    pub platform: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_warning: Option<String>,
    pub last_connected_at: Option<DateTime<FixedOffset>>,
    pub last_disconnected_at: Option<DateTime<FixedOffset>>,
}

impl From<channel_connection::Model> for ConnectionRecord {
    fn from(model: channel_connection::Model) -> Self {
        Self {
            platform: model.platform,
            connected: model.connected,
            username: model.username,
            profile: model.profile,
            profile_warning: model.profile_warning,
            last_connected_at: model.last_connected_at,
            last_disconnected_at: model.last_disconnected_at,
        }
    }
}

/// Result of a disconnect request
#[derive(Debug, Serialize, ToSchema)]
pub struct DisconnectResponse {
    pub status: String,
    pub user_id: String,
    pub platform: String,
}

/// List a user's channel connections
#[utoipa::path(
    get,
    path = "/connections/{user_id}",
    params(("user_id" = String, Path, description = "External auth uid")),
    responses(
        (status = 200, description = "Connection records", body = [ConnectionRecord])
    ),
    security(("bearer_auth" = [])),
    tag = "connections"
)]
pub async fn list_connections(
    _auth: OperatorAuth,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ConnectionRecord>>, ApiError> {
    let repository = ConnectionStatusRepository::new(Arc::clone(&state.db));
    let records = repository.list_for_user(&user_id).await?;

    Ok(Json(records.into_iter().map(ConnectionRecord::from).collect()))
}

/// Disconnect a channel, wiping stored token material
#[utoipa::path(
    delete,
    path = "/connections/{user_id}/{platform}",
    params(
        ("user_id" = String, Path, description = "External auth uid"),
        ("platform" = String, Path, description = "Channel slug")
    ),
    responses(
        (status = 200, description = "Channel disconnected", body = DisconnectResponse),
        (status = 404, description = "No connection to disconnect", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "connections"
)]
pub async fn disconnect(
    _auth: OperatorAuth,
    State(state): State<AppState>,
    Path((user_id, platform)): Path<(String, String)>,
) -> Result<Json<DisconnectResponse>, ApiError> {
    let credentials = CredentialRepository::new(Arc::clone(&state.db), state.crypto_key.clone());
    let statuses = ConnectionStatusRepository::new(Arc::clone(&state.db));

    let credential_wiped = credentials.mark_disconnected(&user_id, &platform).await?;
    let status_flipped = statuses.mark_disconnected(&user_id, &platform).await?;

    if !credential_wiped && !status_flipped {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("No {} connection for user '{}'", platform, user_id),
        ));
    }

    let registrar = WebhookRegistrar::new(
        state.config.automation_base_url.clone(),
        WebhookRepository::new(Arc::clone(&state.db)),
    );
    if let Err(e) = registrar.deactivate(&user_id, &platform).await {
        tracing::warn!(%user_id, %platform, "Webhook deactivation failed: {}", e);
    }

    tracing::info!(%user_id, %platform, "Channel disconnected");
    Ok(Json(DisconnectResponse {
        status: "disconnected".to_string(),
        user_id,
        platform,
    }))
}
