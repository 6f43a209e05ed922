//! Connect flow handler
//!
//! Starts the OAuth flow for a channel: issues the signed state token,
//! builds the provider authorization URL and hands it to the dashboard for
//! browser redirection. No side effects beyond the state issuance.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

use crate::auth::OperatorAuth;
use crate::error::ApiError;
use crate::server::AppState;

const MAX_AUTHORIZE_URL_LEN: usize = 2048;

/// Request to start a connect flow
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConnectRequest {
    /// The user connecting the channel (external auth uid)
    pub user_id: String,
}

/// Authorization URL for browser redirection
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectResponse {
    pub authorize_url: String,
}

/// Start the OAuth connect flow for a channel
#[utoipa::path(
    post,
    path = "/connect/{platform}",
    params(("platform" = String, Path, description = "Channel slug")),
    request_body = ConnectRequest,
    responses(
        (status = 200, description = "Authorization URL built", body = ConnectResponse),
        (status = 400, description = "Invalid user id", body = ApiError),
        (status = 404, description = "Unsupported platform", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "connect"
)]
pub async fn connect(
    _auth: OperatorAuth,
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "user_id must not be empty",
        ));
    }

    let connector = state.registry.get(&platform).map_err(|_| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "UNSUPPORTED_PLATFORM",
            &format!("Channel '{}' is not supported", platform),
        )
    })?;

    let token = state.state_signer.issue(user_id, &platform);
    let url = connector.authorize_url(&token).map_err(|e| {
        tracing::error!(platform = %platform, "Failed to build authorize URL: {}", e);
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "AUTHORIZE_URL_INVALID",
            "Failed to build authorization URL",
        )
    })?;

    validate_authorize_url(&url)?;

    tracing::info!(user_id, platform = %platform, "Connect flow started");
    Ok(Json(ConnectResponse {
        authorize_url: url.into(),
    }))
}

/// The URL handed to the browser must be HTTPS (loopback hosts excepted),
/// fragment-free and within common URL length limits.
fn validate_authorize_url(url: &Url) -> Result<(), ApiError> {
    let loopback = matches!(url.host_str(), Some("127.0.0.1") | Some("localhost"));
    if url.scheme() != "https" && !loopback {
        return Err(invalid_url("authorize URL must use https"));
    }
    if url.fragment().is_some() {
        return Err(invalid_url("authorize URL must not carry a fragment"));
    }
    if url.as_str().len() > MAX_AUTHORIZE_URL_LEN {
        return Err(invalid_url("authorize URL exceeds maximum length"));
    }
    Ok(())
}

fn invalid_url(message: &str) -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "AUTHORIZE_URL_INVALID",
        message,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_urls_pass_validation() {
        let url = Url::parse("https://api.instagram.com/oauth/authorize?client_id=x").unwrap();
        assert!(validate_authorize_url(&url).is_ok());
    }

    #[test]
    fn http_loopback_is_tolerated_for_mock_servers() {
        let url = Url::parse("http://127.0.0.1:3999/oauth/authorize").unwrap();
        assert!(validate_authorize_url(&url).is_ok());
    }

    #[test]
    fn http_non_loopback_is_rejected() {
        let url = Url::parse("http://api.instagram.com/oauth/authorize").unwrap();
        assert!(validate_authorize_url(&url).is_err());
    }

    #[test]
    fn fragments_are_rejected() {
        let url = Url::parse("https://api.instagram.com/oauth/authorize#frag").unwrap();
        assert!(validate_authorize_url(&url).is_err());
    }

    #[test]
    fn oversized_urls_are_rejected() {
        let long_state = "s".repeat(MAX_AUTHORIZE_URL_LEN);
        let url = Url::parse(&format!(
            "https://api.instagram.com/oauth/authorize?state={}",
            long_state
        ))
        .unwrap();
        assert!(validate_authorize_url(&url).is_err());
    }
}
