//! Database migrations for the Channels API.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_06_01_000001_create_users;
mod m2025_06_01_000100_create_social_credentials;
mod m2025_06_01_000200_create_channel_connections;
mod m2025_06_01_000300_create_webhook_registrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_06_01_000001_create_users::Migration),
            Box::new(m2025_06_01_000100_create_social_credentials::Migration),
            Box::new(m2025_06_01_000200_create_channel_connections::Migration),
            Box::new(m2025_06_01_000300_create_webhook_registrations::Migration),
        ]
    }
}
