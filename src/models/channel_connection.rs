//! Channel connection entity model
//!
//! The UI-facing connection-status record, mirroring the credential
//! lifecycle without holding any secret material.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::user::Entity as User;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "channel_connections")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: String,

    pub platform: String,

    /// Whether the channel is currently linked
    pub connected: bool,

    /// Display name fetched during profile enrichment
    pub username: Option<String>,

    /// Raw profile payload from the provider
    #[sea_orm(column_type = "JsonBinary")]
    pub profile: Option<JsonValue>,

    /// Set when the best-effort profile fetch failed; the connection itself
    /// is still considered successful
    pub profile_warning: Option<String>,

    pub last_connected_at: Option<DateTimeWithTimeZone>,
    pub last_disconnected_at: Option<DateTimeWithTimeZone>,

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
