//! OAuth callback handler
//!
//! Terminates the OAuth flow: verifies the signed state token, exchanges the
//! authorization code (upgrading to a long-lived token where the provider
//! distinguishes the two), persists the credential and connection status, and
//! registers the automation webhook. The browser variant always answers with
//! a 302 redirect to a dashboard landing page; the legacy JSON variant
//! answers with problem+json on failure.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header::LOCATION};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::automation::WebhookRegistrar;
use crate::channels::ChannelConnector;
use crate::error::{ApiError, CallbackError, exchange_error};
use crate::repositories::{
    ConnectionProfile, ConnectionStatusRepository, CredentialRepository, CredentialWrite,
    UserRepository, WebhookRepository,
};
use crate::server::AppState;

/// Query parameters a provider may send to the callback
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Body of the legacy JSON callback variant
#[derive(Debug, Deserialize, ToSchema)]
pub struct CallbackBody {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// Connection summary returned by the legacy JSON callback variant
#[derive(Debug, Serialize, ToSchema)]
pub struct CallbackResponse {
    pub status: String,
    pub user_id: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_warning: Option<String>,
}

/// What a completed callback established.
struct CallbackOutcome {
    user_id: String,
    platform: String,
    account_id: Option<String>,
    username: Option<String>,
    profile_warning: Option<String>,
}

/// Browser-facing OAuth callback; always redirects to the dashboard
#[utoipa::path(
    get,
    path = "/callback/{platform}",
    params(
        ("platform" = String, Path, description = "Channel slug"),
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("state" = Option<String>, Query, description = "Signed state token"),
        ("error" = Option<String>, Query, description = "Provider error code")
    ),
    responses(
        (status = 302, description = "Redirect to the dashboard landing page"),
        (status = 404, description = "Unsupported platform", body = ApiError)
    ),
    tag = "callback"
)]
pub async fn callback_get(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let connector = state.registry.get(&platform).map_err(|_| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "UNSUPPORTED_PLATFORM",
            format!("Channel '{}' is not supported", platform),
        )
    })?;

    let outcome = run_callback(
        &state,
        connector.as_ref(),
        &platform,
        query.code.as_deref(),
        query.state.as_deref(),
        provider_error_message(&query),
    )
    .await;

    match outcome {
        Ok(outcome) => {
            tracing::info!(
                user_id = %outcome.user_id,
                platform = %outcome.platform,
                "Channel connected"
            );
            Ok(found(&success_url(&state.config.dashboard_origin, &outcome)))
        }
        Err(err) => {
            tracing::warn!(
                platform = %platform,
                code = err.redirect_code(),
                "OAuth callback failed: {}",
                err
            );
            Ok(found(&error_url(
                &state.config.dashboard_origin,
                &platform,
                &err,
            )))
        }
    }
}

/// Legacy JSON OAuth callback variant
#[utoipa::path(
    post,
    path = "/callback/{platform}",
    params(("platform" = String, Path, description = "Channel slug")),
    request_body = CallbackBody,
    responses(
        (status = 200, description = "Channel connected", body = CallbackResponse),
        (status = 400, description = "Invalid callback parameters", body = ApiError),
        (status = 404, description = "Unsupported platform or unknown user", body = ApiError),
        (status = 502, description = "Provider exchange failed", body = ApiError)
    ),
    tag = "callback"
)]
pub async fn callback_post(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Json(body): Json<CallbackBody>,
) -> Result<Json<CallbackResponse>, ApiError> {
    let connector = state.registry.get(&platform).map_err(|_| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "UNSUPPORTED_PLATFORM",
            format!("Channel '{}' is not supported", platform),
        )
    })?;

    let outcome = run_callback(
        &state,
        connector.as_ref(),
        &platform,
        body.code.as_deref(),
        body.state.as_deref(),
        None,
    )
    .await?;

    Ok(Json(CallbackResponse {
        status: "connected".to_string(),
        user_id: outcome.user_id,
        platform: outcome.platform,
        account_id: outcome.account_id,
        username: outcome.username,
        profile_warning: outcome.profile_warning,
    }))
}

/// The callback pipeline shared by both wire variants.
///
/// Order matters: provider-reported denial first, then parameter presence,
/// then state verification, so an attacker learns nothing about token
/// handling from a forged request.
async fn run_callback(
    state: &AppState,
    connector: &dyn ChannelConnector,
    platform: &str,
    code: Option<&str>,
    state_token: Option<&str>,
    provider_error: Option<String>,
) -> Result<CallbackOutcome, CallbackError> {
    if let Some(message) = provider_error {
        return Err(CallbackError::ProviderReported {
            platform: platform.to_string(),
            message,
        });
    }

    let code = match code.filter(|c| !c.trim().is_empty()) {
        Some(code) => code,
        None => return Err(CallbackError::MissingCode),
    };
    let state_token = match state_token.filter(|s| !s.trim().is_empty()) {
        Some(token) => token,
        None => return Err(CallbackError::MissingState),
    };

    let payload = state.state_signer.verify(state_token, platform)?;
    let user_id = payload.user_id;

    let grant = connector
        .exchange_code(&state.http, code)
        .await
        .map_err(|e| exchange_error(platform, e, false))?;

    let grant = match connector.exchange_long_lived(&state.http, &grant).await {
        Ok(Some(long_lived)) => long_lived,
        Ok(None) => grant,
        Err(e) => return Err(exchange_error(platform, e, true)),
    };

    let users = UserRepository::new(Arc::clone(&state.db));
    let known = users
        .exists(&user_id)
        .await
        .map_err(CallbackError::Persistence)?;
    if !known {
        return Err(CallbackError::UserNotFound { user_id });
    }

    // Profile fetch is best effort: a flaky provider API must not lose the
    // tokens we already hold. The failure is recorded on the connection.
    let (profile, profile_warning) = match connector.fetch_profile(&state.http, &grant).await {
        Ok(profile) => (Some(profile), None),
        Err(e) => {
            tracing::warn!(%user_id, platform, "Profile fetch failed: {}", e);
            (None, Some(format!("profile fetch failed: {}", e)))
        }
    };

    let account_id = grant
        .account_id
        .clone()
        .or_else(|| profile.as_ref().and_then(|p| p.account_id.clone()));
    let username = profile.as_ref().and_then(|p| p.username.clone());
    let expires_at = grant
        .expires_in
        .map(|secs| (Utc::now() + chrono::Duration::seconds(secs)).into());

    let credentials = CredentialRepository::new(Arc::clone(&state.db), state.crypto_key.clone());
    credentials
        .write(
            &user_id,
            platform,
            CredentialWrite {
                access_token: Some(grant.access_token.as_str()),
                refresh_token: grant.refresh_token.as_deref(),
                expires_at,
                scope: grant.scope.clone(),
                account_id: account_id.clone(),
            },
        )
        .await
        .map_err(CallbackError::Persistence)?;

    let statuses = ConnectionStatusRepository::new(Arc::clone(&state.db));
    statuses
        .mark_connected(
            &user_id,
            platform,
            ConnectionProfile {
                username: username.clone(),
                profile: profile.map(|p| p.details),
                profile_warning: profile_warning.clone(),
            },
        )
        .await
        .map_err(CallbackError::Persistence)?;

    // Webhook registration is best effort as well; the connection stands
    // without it and a reconnect retries it.
    if connector.metadata().supports_webhooks {
        let registrar = WebhookRegistrar::new(
            state.config.automation_base_url.clone(),
            WebhookRepository::new(Arc::clone(&state.db)),
        );
        if let Err(e) = registrar.register(&user_id, platform).await {
            tracing::warn!(%user_id, platform, "Webhook registration failed: {}", e);
        }
    }

    Ok(CallbackOutcome {
        user_id,
        platform: platform.to_string(),
        account_id,
        username,
        profile_warning,
    })
}

fn provider_error_message(query: &CallbackQuery) -> Option<String> {
    query
        .error
        .as_ref()
        .map(|code| match &query.error_description {
            Some(description) => format!("{}: {}", code, description),
            None => code.clone(),
        })
}

/// Plain 302 with a Location header. `axum::response::Redirect` answers 303
/// for GET, which some dashboard router versions refuse to follow.
fn found(url: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, url.to_string())]).into_response()
}

fn landing_url(origin: &str, path: &str, params: &[(&str, &str)]) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        query.append_pair(key, value);
    }
    format!("{}{}?{}", origin.trim_end_matches('/'), path, query.finish())
}

fn success_url(origin: &str, outcome: &CallbackOutcome) -> String {
    let mut params: Vec<(&str, &str)> = vec![
        ("userId", outcome.user_id.as_str()),
        ("platform", outcome.platform.as_str()),
    ];
    let account_param = format!("{}Id", outcome.platform);
    if let Some(account_id) = &outcome.account_id {
        params.push((account_param.as_str(), account_id.as_str()));
    }
    landing_url(origin, "/connect/success", &params)
}

fn error_url(origin: &str, platform: &str, error: &CallbackError) -> String {
    let message = error.to_string();
    landing_url(
        origin,
        "/connect/error",
        &[
            ("platform", platform),
            ("code", error.redirect_code()),
            ("message", message.as_str()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(account_id: Option<&str>) -> CallbackOutcome {
        CallbackOutcome {
            user_id: "user42".to_string(),
            platform: "instagram".to_string(),
            account_id: account_id.map(str::to_string),
            username: Some("maria".to_string()),
            profile_warning: None,
        }
    }

    #[test]
    fn success_url_carries_platform_scoped_account_id() {
        let url = success_url("http://localhost:3000", &outcome(Some("ig9")));
        assert_eq!(
            url,
            "http://localhost:3000/connect/success?userId=user42&platform=instagram&instagramId=ig9"
        );
    }

    #[test]
    fn success_url_omits_account_id_when_unknown() {
        let url = success_url("http://localhost:3000/", &outcome(None));
        assert_eq!(
            url,
            "http://localhost:3000/connect/success?userId=user42&platform=instagram"
        );
    }

    #[test]
    fn error_url_encodes_message() {
        let url = error_url(
            "http://localhost:3000",
            "gmail",
            &CallbackError::MissingCode,
        );
        assert!(url.starts_with("http://localhost:3000/connect/error?platform=gmail&code=missing_code&message="));
        assert!(url.contains("authorization+code+is+missing"));
    }

    #[test]
    fn provider_error_combines_code_and_description() {
        let query = CallbackQuery {
            code: None,
            state: None,
            error: Some("access_denied".to_string()),
            error_description: Some("The user denied your request.".to_string()),
        };
        assert_eq!(
            provider_error_message(&query).as_deref(),
            Some("access_denied: The user denied your request.")
        );
    }

    #[test]
    fn found_answers_302_with_location() {
        let response = found("http://localhost:3000/connect/success?userId=u");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "http://localhost:3000/connect/success?userId=u"
        );
    }
}
