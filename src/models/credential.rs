//! Credential entity model
//!
//! This module contains the SeaORM entity model for the social_credentials
//! table, which stores the per-(user, platform) OAuth token record. Token
//! columns hold AES-256-GCM ciphertext, never plaintext.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

use super::user::Entity as User;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "social_credentials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning user (external auth uid)
    pub user_id: String,

    /// Channel slug (unique per user together with user_id)
    pub platform: String,

    /// Encrypted access token ciphertext
    pub access_token_ciphertext: Option<Vec<u8>>,

    /// Encrypted refresh token ciphertext
    pub refresh_token_ciphertext: Option<Vec<u8>>,

    /// Access token expiry, when the provider reports one
    pub expires_at: Option<DateTimeWithTimeZone>,

    /// Granted scope string as reported by the provider
    pub scope: Option<String>,

    /// Provider-side account identifier (e.g. Instagram account id)
    pub account_id: Option<String>,

    /// Last time messages were synced for this credential
    pub last_synced_at: Option<DateTimeWithTimeZone>,

    /// Stamped on logical disconnect; tokens are nulled at the same time
    pub disconnected_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "User",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<User> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
