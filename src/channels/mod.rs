//! Channel connector implementations
//!
//! Each supported messaging platform implements the [`ChannelConnector`]
//! trait; the [`Registry`] holds the connectors built from configuration at
//! startup.

pub mod gmail;
pub mod instagram;
pub mod metadata;
pub mod registry;
pub mod trait_;
pub mod whatsapp;

pub use gmail::GmailConnector;
pub use instagram::InstagramConnector;
pub use metadata::ChannelMetadata;
pub use registry::{Registry, RegistryError};
pub use trait_::{ChannelConnector, ChannelError, ChannelProfile, TokenGrant};
pub use whatsapp::WhatsAppConnector;
