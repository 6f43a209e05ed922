//! Channel metadata
//!
//! Describes the capabilities of a registered channel for API consumers and
//! for the connect/callback pipeline.

use serde::Serialize;
use utoipa::ToSchema;

/// Metadata describing a registered channel.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ChannelMetadata {
    /// Channel identifier used in URLs (e.g. "instagram")
    pub slug: String,
    /// Human-readable channel name
    pub display_name: String,
    /// OAuth scopes requested during authorization
    pub scopes: Vec<String>,
    /// Delimiter used when joining scopes into the `scope` parameter
    pub scope_delimiter: String,
    /// Whether a webhook is registered with the automation engine on connect
    pub supports_webhooks: bool,
}

impl ChannelMetadata {
    pub fn new(
        slug: impl Into<String>,
        display_name: impl Into<String>,
        scopes: Vec<String>,
        scope_delimiter: impl Into<String>,
        supports_webhooks: bool,
    ) -> Self {
        Self {
            slug: slug.into(),
            display_name: display_name.into(),
            scopes,
            scope_delimiter: scope_delimiter.into(),
            supports_webhooks,
        }
    }

    /// The scopes joined with this channel's delimiter, as sent to the provider.
    pub fn scope_param(&self) -> String {
        self.scopes.join(&self.scope_delimiter)
    }
}
