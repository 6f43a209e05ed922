//! WhatsApp connector implementation
//!
//! WhatsApp Business connects through the Meta dialog flow: a single token
//! exchange, space-joined scopes, and the business account id read from the
//! Graph API after the exchange.

use async_trait::async_trait;
use url::Url;

use crate::channels::{
    ChannelConnector, ChannelError, ChannelMetadata, ChannelProfile, TokenGrant,
    trait_::{id_field, provider_json, required_str},
};
use crate::config::PlatformOAuthConfig;

const DEFAULT_AUTHORIZE_BASE: &str = "https://www.facebook.com";
const DEFAULT_TOKEN_BASE: &str = "https://graph.facebook.com";
const DEFAULT_API_BASE: &str = "https://graph.facebook.com";

pub const DEFAULT_SCOPES: &[&str] = &[
    "whatsapp_business_management",
    "whatsapp_business_messaging",
];

pub struct WhatsAppConnector {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    authorize_base: String,
    token_base: String,
    api_base: String,
    metadata: ChannelMetadata,
}

impl WhatsAppConnector {
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
            metadata: ChannelMetadata::new("whatsapp", "WhatsApp Business", scopes, " ", true),
        }
    }
}

#[async_trait]
impl ChannelConnector for WhatsAppConnector {
    fn metadata(&self) -> &ChannelMetadata {
        &self.metadata
    }

    fn authorize_url(&self, state: &str) -> Result<Url, ChannelError> {
        let mut url = Url::parse(&format!("{}/dialog/oauth", self.authorize_base))?;
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
            // The Meta token response carries no account id; the business
            // account id comes from the profile fetch.
            account_id: id_field(&body, "business_account_id"),
        })
    }

    async fn fetch_profile(
        &self,
        http: &reqwest::Client,
        grant: &TokenGrant,
    ) -> Result<ChannelProfile, ChannelError> {
        let mut url = Url::parse(&format!("{}/me", self.api_base))?;
        url.query_pairs_mut()
            .append_pair("fields", "id,name")
            .append_pair("access_token", &grant.access_token);

        let response = http.get(url).send().await?;
        let body = provider_json(response).await?;

        Ok(ChannelProfile {
            account_id: id_field(&body, "id").or_else(|| grant.account_id.clone()),
            username: body
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            details: body,
        })
    }
}
