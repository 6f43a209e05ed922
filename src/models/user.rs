//! User entity model
//!
//! Users are created by the out-of-scope auth-provider sync; the callback
//! flow only reads this table to refuse credential writes for unknown users.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// External auth-provider uid (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Whether the user is on a paid plan
    pub paid: bool,

    /// End of the trial period, if any
    pub trial_ends_at: Option<DateTimeWithTimeZone>,

    /// Whether at least one channel has ever been linked
    pub linked: bool,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::credential::Entity")]
    Credentials,
    #[sea_orm(has_many = "super::channel_connection::Entity")]
    ChannelConnections,
    #[sea_orm(has_many = "super::webhook::Entity")]
    WebhookRegistrations,
}

impl Related<super::credential::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Credentials.def()
    }
}

impl Related<super::channel_connection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChannelConnections.def()
    }
}

impl Related<super::webhook::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WebhookRegistrations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
