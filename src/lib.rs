//! # Channels API Library
//!
//! This library provides the core functionality for the Channels API
//! service: the OAuth connect/callback flow for customer communication
//! channels, credential storage, and server configuration.

pub mod auth;
pub mod automation;
pub mod channels;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod oauth_state;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub use migration;
