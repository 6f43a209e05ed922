//! Webhook registration repository

use anyhow::Result;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::webhook::{self, Entity as WebhookRegistration};

/// Repository for webhook registration records
#[derive(Debug, Clone)]
pub struct WebhookRepository {
    pub db: Arc<DatabaseConnection>,
}

impl WebhookRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find(&self, user_id: &str, platform: &str) -> Result<Option<webhook::Model>> {
        Ok(WebhookRegistration::find()
            .filter(webhook::Column::UserId.eq(user_id))
            .filter(webhook::Column::Platform.eq(platform))
            .one(&*self.db)
            .await?)
    }

    /// Upsert an active registration for the derived URL.
    pub async fn upsert_active(
        &self,
        user_id: &str,
        platform: &str,
        url: &str,
    ) -> Result<webhook::Model> {
        let now: DateTimeWithTimeZone = Utc::now().into();

        match self.find(user_id, platform).await? {
            Some(existing) => {
                let mut active: webhook::ActiveModel = existing.into();
                active.url = Set(url.to_string());
                active.active = Set(true);
                active.updated_at = Set(now);
                Ok(active.update(&*self.db).await?)
            }
            None => {
                let active = webhook::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id.to_string()),
                    platform: Set(platform.to_string()),
                    url: Set(url.to_string()),
                    active: Set(true),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                Ok(active.insert(&*self.db).await?)
            }
        }
    }

    /// Deactivates the registration on disconnect, if one exists.
    pub async fn deactivate(&self, user_id: &str, platform: &str) -> Result<bool> {
        let Some(existing) = self.find(user_id, platform).await? else {
            return Ok(false);
        };

        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut active: webhook::ActiveModel = existing.into();
        active.active = Set(false);
        active.updated_at = Set(now);
        active.update(&*self.db).await?;
        Ok(true)
    }
}
