//! Automation-engine webhook registrar
//!
//! Derives the webhook URL the automation engine will be called on for a
//! connected channel and persists it as an active registration. This is a
//! registration of intent: the engine is not consulted for confirmation.

use anyhow::Result;

use crate::models::webhook;
use crate::repositories::WebhookRepository;

/// Derive `<base>/webhook/<platform>/<userId>` from the automation base URL.
pub fn derive_webhook_url(base_url: &str, platform: &str, user_id: &str) -> String {
    format!(
        "{}/webhook/{}/{}",
        base_url.trim_end_matches('/'),
        platform,
        user_id
    )
}

/// Registers automation-engine webhooks for connected channels.
#[derive(Debug, Clone)]
pub struct WebhookRegistrar {
    base_url: String,
    repository: WebhookRepository,
}

impl WebhookRegistrar {
    pub fn new(base_url: impl Into<String>, repository: WebhookRepository) -> Self {
        Self {
            base_url: base_url.into(),
            repository,
        }
    }

    /// Persist an active registration for the derived URL.
    pub async fn register(&self, user_id: &str, platform: &str) -> Result<webhook::Model> {
        let url = derive_webhook_url(&self.base_url, platform, user_id);
        let registration = self.repository.upsert_active(user_id, platform, &url).await?;
        tracing::info!(user_id, platform, url = %registration.url, "Webhook registered");
        Ok(registration)
    }

    /// Deactivate the registration on disconnect, if one exists.
    pub async fn deactivate(&self, user_id: &str, platform: &str) -> Result<bool> {
        self.repository.deactivate(user_id, platform).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_derivation_is_deterministic() {
        assert_eq!(
            derive_webhook_url("http://localhost:5678", "instagram", "user42"),
            "http://localhost:5678/webhook/instagram/user42"
        );
    }

    #[test]
    fn trailing_slash_on_base_is_tolerated() {
        assert_eq!(
            derive_webhook_url("https://automation.example.com/", "whatsapp", "user42"),
            "https://automation.example.com/webhook/whatsapp/user42"
        );
    }
}
