//! Channel registry
//!
//! In-memory registry mapping channel slugs to connector instances. Built
//! once from configuration at startup and carried in the application state;
//! there is no global mutable registry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::channels::{
    ChannelConnector, ChannelMetadata, GmailConnector, InstagramConnector, WhatsAppConnector,
};
use crate::config::AppConfig;

/// Error type for registry operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("Channel '{slug}' is not supported")]
    UnsupportedChannel { slug: String },
}

/// Registry holding the connectors for every configured channel.
pub struct Registry {
    connectors: HashMap<String, Arc<dyn ChannelConnector>>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            connectors: HashMap::new(),
        }
    }

    /// Build a registry from configuration, registering each platform that
    /// carries OAuth credentials.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new();

        if let Some(ref instagram) = config.instagram {
            registry.register(Arc::new(InstagramConnector::from_config(instagram)));
        }
        if let Some(ref whatsapp) = config.whatsapp {
            registry.register(Arc::new(WhatsAppConnector::from_config(whatsapp)));
        }
        if let Some(ref gmail) = config.gmail {
            registry.register(Arc::new(GmailConnector::from_config(gmail)));
        }

        let registered: Vec<_> = registry.connectors.keys().cloned().collect();
        info!(channels = ?registered, "Channel registry initialized");

        registry
    }

    /// Register a connector under its metadata slug
    pub fn register(&mut self, connector: Arc<dyn ChannelConnector>) {
        let slug = connector.metadata().slug.clone();
        self.connectors.insert(slug, connector);
    }

    /// Get a connector by channel slug
    pub fn get(&self, slug: &str) -> Result<Arc<dyn ChannelConnector>, RegistryError> {
        self.connectors
            .get(slug)
            .cloned()
            .ok_or_else(|| RegistryError::UnsupportedChannel {
                slug: slug.to_string(),
            })
    }

    /// Metadata for all registered channels, sorted by slug for stable ordering
    pub fn list_metadata(&self) -> Vec<ChannelMetadata> {
        let mut metadata: Vec<_> = self
            .connectors
            .values()
            .map(|c| c.metadata().clone())
            .collect();
        metadata.sort_by(|a, b| a.slug.cmp(&b.slug));
        metadata
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
