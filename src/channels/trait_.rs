//! Channel connector trait definition
//!
//! Defines the interface every channel implementation must follow: building
//! the authorization URL, exchanging the callback code for tokens,
//! optionally upgrading to a long-lived token, and fetching profile
//! information for the connection record.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::channels::ChannelMetadata;

/// Channel-specific error types for structured error handling
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The provider answered with an error payload (possibly on a 2xx status)
    #[error("provider reported: {message}")]
    ProviderReported { message: String },
    /// Non-success HTTP status from the provider
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// Network or connectivity error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Response body that does not match the provider's documented shape
    #[error("malformed provider response: {0}")]
    Malformed(String),
    /// URL construction failure
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Tokens granted by a provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds, when the provider reports one
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    /// Provider-side account identifier, when the token response carries one
    pub account_id: Option<String>,
}

/// Profile information fetched for the connection-status record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelProfile {
    pub account_id: Option<String>,
    pub username: Option<String>,
    /// Raw provider payload stored alongside the structured fields
    pub details: serde_json::Value,
}

#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Static capabilities of this channel.
    fn metadata(&self) -> &ChannelMetadata;

    /// Build the provider authorization URL embedding the given state token.
    fn authorize_url(&self, state: &str) -> Result<Url, ChannelError>;

    /// Exchange the callback authorization code for tokens.
    async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
    ) -> Result<TokenGrant, ChannelError>;

    /// Upgrade a short-lived grant to a long-lived one, for providers that
    /// distinguish the two. Returns `None` when the channel has no second
    /// exchange step.
    async fn exchange_long_lived(
        &self,
        _http: &reqwest::Client,
        _grant: &TokenGrant,
    ) -> Result<Option<TokenGrant>, ChannelError> {
        Ok(None)
    }

    /// Fetch profile information for the connection record. Callers treat
    /// failure here as non-fatal.
    async fn fetch_profile(
        &self,
        http: &reqwest::Client,
        grant: &TokenGrant,
    ) -> Result<ChannelProfile, ChannelError>;
}

/// Read a provider response as JSON, surfacing HTTP failures and
/// provider-reported error payloads. Providers are known to return error
/// bodies under a 200 status, so the body is inspected even on success.
pub(crate) async fn provider_json(
    response: reqwest::Response,
) -> Result<serde_json::Value, ChannelError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ChannelError::Http {
            status: status.as_u16(),
            body,
        });
    }

    let value: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| ChannelError::Malformed(format!("body is not JSON: {}", e)))?;

    if let Some(message) = provider_error_message(&value) {
        return Err(ChannelError::ProviderReported { message });
    }

    Ok(value)
}

/// Extract a provider-reported error message from a response body, if present.
pub(crate) fn provider_error_message(value: &serde_json::Value) -> Option<String> {
    for key in ["error_message", "error_description"] {
        if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
            return Some(message.to_string());
        }
    }

    match value.get("error") {
        Some(serde_json::Value::String(message)) => Some(message.clone()),
        Some(object @ serde_json::Value::Object(_)) => Some(
            object
                .get("message")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| object.to_string()),
        ),
        _ => None,
    }
}

/// Pull a required string field out of a token response.
pub(crate) fn required_str(
    value: &serde_json::Value,
    field: &str,
) -> Result<String, ChannelError> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ChannelError::Malformed(format!("missing '{}' in token response", field)))
}

/// Read a provider id field that may be serialized as a string or a number.
pub(crate) fn id_field(value: &serde_json::Value, field: &str) -> Option<String> {
    match value.get(field) {
        Some(serde_json::Value::String(id)) => Some(id.clone()),
        Some(serde_json::Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}
