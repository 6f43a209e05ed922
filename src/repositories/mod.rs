//! # Repositories
//!
//! Database access layers encapsulating SeaORM operations per table.

pub mod connection_status;
pub mod credential;
pub mod user;
pub mod webhook;

pub use connection_status::{ConnectionProfile, ConnectionStatusRepository};
pub use credential::{CredentialRepository, CredentialWrite};
pub use user::UserRepository;
pub use webhook::WebhookRepository;
