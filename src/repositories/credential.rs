//! Credential repository for database operations
//!
//! Encapsulates SeaORM operations for the social_credentials table: the
//! merge-semantics upsert performed by the OAuth callback, token
//! decryption, and the logical disconnect.

use anyhow::{Result, anyhow};
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::crypto::{CryptoKey, decrypt_credential_tokens, encrypt_credential_tokens};
use crate::models::credential::{self, Entity as Credential};

/// Fields written on a successful callback.
#[derive(Debug, Clone, Default)]
pub struct CredentialWrite<'a> {
    pub access_token: Option<&'a str>,
    pub refresh_token: Option<&'a str>,
    pub expires_at: Option<DateTimeWithTimeZone>,
    pub scope: Option<String>,
    pub account_id: Option<String>,
}

/// Repository for credential database operations
#[derive(Debug, Clone)]
pub struct CredentialRepository {
    pub db: Arc<DatabaseConnection>,
    pub crypto_key: CryptoKey,
}

impl CredentialRepository {
    pub fn new(db: Arc<DatabaseConnection>, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    /// Finds the credential record for a `(user, platform)` pair.
    pub async fn find(&self, user_id: &str, platform: &str) -> Result<Option<credential::Model>> {
        Ok(Credential::find()
            .filter(credential::Column::UserId.eq(user_id))
            .filter(credential::Column::Platform.eq(platform))
            .one(&*self.db)
            .await?)
    }

    /// Merge-semantics upsert of the credential record.
    ///
    /// Token fields and expiry always take the new values (a reconnect
    /// replaces the grant); `scope` and `account_id` keep their stored
    /// values when the write carries `None`. Any previous disconnect is
    /// cleared. Idempotent for identical inputs apart from `updated_at`.
    pub async fn write(
        &self,
        user_id: &str,
        platform: &str,
        fields: CredentialWrite<'_>,
    ) -> Result<credential::Model> {
        let (access_ct, refresh_ct) = encrypt_credential_tokens(
            &self.crypto_key,
            user_id,
            platform,
            fields.access_token,
            fields.refresh_token,
        )
        .map_err(|e| anyhow!("Token encryption failed: {}", e))?;

        let now: DateTimeWithTimeZone = Utc::now().into();

        match self.find(user_id, platform).await? {
            Some(existing) => {
                let mut active: credential::ActiveModel = existing.into();
                active.access_token_ciphertext = Set(access_ct);
                active.refresh_token_ciphertext = Set(refresh_ct);
                active.expires_at = Set(fields.expires_at);
                if let Some(scope) = fields.scope {
                    active.scope = Set(Some(scope));
                }
                if let Some(account_id) = fields.account_id {
                    active.account_id = Set(Some(account_id));
                }
                active.disconnected_at = Set(None);
                active.updated_at = Set(now);
                Ok(active.update(&*self.db).await?)
            }
            None => {
                let active = credential::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id.to_string()),
                    platform: Set(platform.to_string()),
                    access_token_ciphertext: Set(access_ct),
                    refresh_token_ciphertext: Set(refresh_ct),
                    expires_at: Set(fields.expires_at),
                    scope: Set(fields.scope),
                    account_id: Set(fields.account_id),
                    last_synced_at: Set(None),
                    disconnected_at: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                Ok(active.insert(&*self.db).await?)
            }
        }
    }

    /// Decrypts the token pair stored on a credential record.
    pub async fn decrypt_tokens(
        &self,
        credential: &credential::Model,
    ) -> Result<(Option<String>, Option<String>)> {
        decrypt_credential_tokens(
            &self.crypto_key,
            &credential.user_id,
            &credential.platform,
            credential.access_token_ciphertext.as_deref(),
            credential.refresh_token_ciphertext.as_deref(),
        )
        .map_err(|e| {
            tracing::error!(
                user_id = %credential.user_id,
                platform = %credential.platform,
                "Token decryption failed"
            );
            anyhow!("Token decryption failed: {}", e)
        })
    }

    /// Logical disconnect: nulls both token ciphertexts and stamps
    /// `disconnected_at`. The record itself is never deleted. Returns
    /// `false` when no credential exists for the pair.
    pub async fn mark_disconnected(&self, user_id: &str, platform: &str) -> Result<bool> {
        let Some(existing) = self.find(user_id, platform).await? else {
            return Ok(false);
        };

        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut active: credential::ActiveModel = existing.into();
        active.access_token_ciphertext = Set(None);
        active.refresh_token_ciphertext = Set(None);
        active.expires_at = Set(None);
        active.disconnected_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&*self.db).await?;
        Ok(true)
    }
}
