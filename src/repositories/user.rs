//! User repository
//!
//! The callback flow only ever reads the users table; row creation belongs
//! to the auth-provider sync outside this service.

use anyhow::Result;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;

use crate::models::user::{self, Entity as User};

#[derive(Debug, Clone)]
pub struct UserRepository {
    pub db: Arc<DatabaseConnection>,
}

impl UserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Existence check guarding against orphaned credential writes.
    pub async fn exists(&self, user_id: &str) -> Result<bool> {
        Ok(User::find_by_id(user_id).one(&*self.db).await?.is_some())
    }

    pub async fn find(&self, user_id: &str) -> Result<Option<user::Model>> {
        Ok(User::find_by_id(user_id).one(&*self.db).await?)
    }
}
