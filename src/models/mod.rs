//! # Data Models
//!
//! This module contains all the data models used throughout the Channels API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod channel_connection;
pub mod credential;
pub mod user;
pub mod webhook;

pub use channel_connection::Entity as ChannelConnection;
pub use credential::Entity as Credential;
pub use user::Entity as User;
pub use webhook::Entity as WebhookRegistration;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "channels".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
