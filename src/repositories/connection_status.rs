//! Connection-status repository
//!
//! Maintains the UI-facing channel_connections records in lockstep with the
//! credential lifecycle.

use anyhow::Result;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::channel_connection::{self, Entity as ChannelConnection};

/// Profile fields recorded with a successful connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionProfile {
    pub username: Option<String>,
    pub profile: Option<serde_json::Value>,
    /// Present when the best-effort enrichment fetch failed
    pub profile_warning: Option<String>,
}

/// Repository for connection-status database operations
#[derive(Debug, Clone)]
pub struct ConnectionStatusRepository {
    pub db: Arc<DatabaseConnection>,
}

impl ConnectionStatusRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find(
        &self,
        user_id: &str,
        platform: &str,
    ) -> Result<Option<channel_connection::Model>> {
        Ok(ChannelConnection::find()
            .filter(channel_connection::Column::UserId.eq(user_id))
            .filter(channel_connection::Column::Platform.eq(platform))
            .one(&*self.db)
            .await?)
    }

    /// All connection-status records for a user, ordered by platform.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<channel_connection::Model>> {
        Ok(ChannelConnection::find()
            .filter(channel_connection::Column::UserId.eq(user_id))
            .order_by_asc(channel_connection::Column::Platform)
            .all(&*self.db)
            .await?)
    }

    /// Upsert marking the channel connected, recording profile fields and
    /// stamping `last_connected_at`.
    pub async fn mark_connected(
        &self,
        user_id: &str,
        platform: &str,
        profile: ConnectionProfile,
    ) -> Result<channel_connection::Model> {
        let now: DateTimeWithTimeZone = Utc::now().into();

        match self.find(user_id, platform).await? {
            Some(existing) => {
                let mut active: channel_connection::ActiveModel = existing.into();
                active.connected = Set(true);
                active.username = Set(profile.username);
                active.profile = Set(profile.profile);
                active.profile_warning = Set(profile.profile_warning);
                active.last_connected_at = Set(Some(now));
                active.updated_at = Set(now);
                Ok(active.update(&*self.db).await?)
            }
            None => {
                let active = channel_connection::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id.to_string()),
                    platform: Set(platform.to_string()),
                    connected: Set(true),
                    username: Set(profile.username),
                    profile: Set(profile.profile),
                    profile_warning: Set(profile.profile_warning),
                    last_connected_at: Set(Some(now)),
                    last_disconnected_at: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                Ok(active.insert(&*self.db).await?)
            }
        }
    }

    /// Flips `connected` to false and stamps `last_disconnected_at`.
    /// Returns `false` when no record exists for the pair.
    pub async fn mark_disconnected(&self, user_id: &str, platform: &str) -> Result<bool> {
        let Some(existing) = self.find(user_id, platform).await? else {
            return Ok(false);
        };

        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut active: channel_connection::ActiveModel = existing.into();
        active.connected = Set(false);
        active.last_disconnected_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&*self.db).await?;
        Ok(true)
    }
}
