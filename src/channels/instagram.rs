//! Instagram connector implementation
//!
//! Instagram uses the two-step token exchange: the callback code buys a
//! short-lived token which is then upgraded to a long-lived one. Scopes are
//! comma-joined, and the token response carries the Instagram account id.

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::channels::{
    ChannelConnector, ChannelError, ChannelMetadata, ChannelProfile, TokenGrant,
    trait_::{id_field, provider_json, required_str},
};
use crate::config::PlatformOAuthConfig;

const DEFAULT_AUTHORIZE_BASE: &str = "https://api.instagram.com";
const DEFAULT_TOKEN_BASE: &str = "https://api.instagram.com";
const DEFAULT_API_BASE: &str = "https://graph.instagram.com";

pub const DEFAULT_SCOPES: &[&str] = &[
    "instagram_business_basic",
    "instagram_business_manage_messages",
];

pub struct InstagramConnector {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    authorize_base: String,
    token_base: String,
    api_base: String,
    metadata: ChannelMetadata,
}

impl InstagramConnector {
    pub fn from_config(config: &PlatformOAuthConfig) -> Self {
        let scopes = config
            .scopes
            .as_deref()
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|| DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect());

        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            authorize_base: config
                .authorize_base
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTHORIZE_BASE.to_string()),
            token_base: config
                .token_base
                .clone()
                .unwrap_or_else(|| DEFAULT_TOKEN_BASE.to_string()),
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            metadata: ChannelMetadata::new("instagram", "Instagram", scopes, ",", true),
        }
    }
}

#[async_trait]
impl ChannelConnector for InstagramConnector {
    fn metadata(&self) -> &ChannelMetadata {
        &self.metadata
    }

    fn authorize_url(&self, state: &str) -> Result<Url, ChannelError> {
        let mut url = Url::parse(&format!("{}/oauth/authorize", self.authorize_base))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.metadata.scope_param())
            .append_pair("response_type", "code")
            .append_pair("state", state);
        Ok(url)
    }

    async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
    ) -> Result<TokenGrant, ChannelError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
        ];

        let response = http
            .post(format!("{}/oauth/access_token", self.token_base))
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        let body = provider_json(response).await?;
        Ok(TokenGrant {
            access_token: required_str(&body, "access_token")?,
            refresh_token: None,
            expires_in: body.get("expires_in").and_then(|v| v.as_i64()),
            scope: Some(self.metadata.scope_param()),
            account_id: id_field(&body, "user_id"),
        })
    }

    async fn exchange_long_lived(
        &self,
        http: &reqwest::Client,
        grant: &TokenGrant,
    ) -> Result<Option<TokenGrant>, ChannelError> {
        let mut url = Url::parse(&format!("{}/access_token", self.api_base))?;
        url.query_pairs_mut()
            .append_pair("grant_type", "ig_exchange_token")
            .append_pair("client_secret", &self.client_secret)
            .append_pair("access_token", &grant.access_token);

        let response = http.get(url).send().await?;
        let body = provider_json(response).await?;

        debug!("Upgraded Instagram token to long-lived");
        Ok(Some(TokenGrant {
            access_token: required_str(&body, "access_token")?,
            refresh_token: None,
            expires_in: body.get("expires_in").and_then(|v| v.as_i64()),
            scope: grant.scope.clone(),
            account_id: grant.account_id.clone(),
        }))
    }

    async fn fetch_profile(
        &self,
        http: &reqwest::Client,
        grant: &TokenGrant,
    ) -> Result<ChannelProfile, ChannelError> {
        let mut url = Url::parse(&format!("{}/me", self.api_base))?;
        url.query_pairs_mut()
            .append_pair("fields", "id,username,account_type,followers_count")
            .append_pair("access_token", &grant.access_token);

        let response = http.get(url).send().await?;
        let body = provider_json(response).await?;

        Ok(ChannelProfile {
            account_id: id_field(&body, "id").or_else(|| grant.account_id.clone()),
            username: body
                .get("username")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            details: body,
        })
    }
}
