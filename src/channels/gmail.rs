//! Gmail connector implementation
//!
//! Gmail uses the Google OAuth flow with `access_type=offline` and
//! `prompt=consent` so every connect yields a refresh token. Scopes are
//! space-joined; the mailbox address doubles as the account id.

use async_trait::async_trait;
use url::Url;

use crate::channels::{
    ChannelConnector, ChannelError, ChannelMetadata, ChannelProfile, TokenGrant,
    trait_::{provider_json, required_str},
};
use crate::config::PlatformOAuthConfig;

const DEFAULT_AUTHORIZE_BASE: &str = "https://accounts.google.com";
const DEFAULT_TOKEN_BASE: &str = "https://oauth2.googleapis.com";
const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com";

pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.send",
];

pub struct GmailConnector {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    authorize_base: String,
    token_base: String,
    api_base: String,
    metadata: ChannelMetadata,
}

impl GmailConnector {
    pub fn from_config(config: &PlatformOAuthConfig) -> Self {
        let scopes = config
            .scopes
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
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
            metadata: ChannelMetadata::new("gmail", "Gmail", scopes, " ", false),
        }
    }
}

#[async_trait]
impl ChannelConnector for GmailConnector {
    fn metadata(&self) -> &ChannelMetadata {
        &self.metadata
    }

    fn authorize_url(&self, state: &str) -> Result<Url, ChannelError> {
        let mut url = Url::parse(&format!("{}/o/oauth2/v2/auth", self.authorize_base))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.metadata.scope_param())
            .append_pair("response_type", "code")
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
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
            .post(format!("{}/token", self.token_base))
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        let body = provider_json(response).await?;
        Ok(TokenGrant {
            access_token: required_str(&body, "access_token")?,
            refresh_token: body
                .get("refresh_token")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            expires_in: body.get("expires_in").and_then(|v| v.as_i64()),
            scope: body
                .get("scope")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .or_else(|| Some(self.metadata.scope_param())),
            account_id: None,
        })
    }

    async fn fetch_profile(
        &self,
        http: &reqwest::Client,
        grant: &TokenGrant,
    ) -> Result<ChannelProfile, ChannelError> {
        let response = http
            .get(format!("{}/gmail/v1/users/me/profile", self.api_base))
            .bearer_auth(&grant.access_token)
            .send()
            .await?;

        let body = provider_json(response).await?;
        let email = body
            .get("emailAddress")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(ChannelProfile {
            account_id: email.clone(),
            username: email,
            details: body,
        })
    }
}
