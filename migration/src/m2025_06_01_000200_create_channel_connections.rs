//! Migration to create the channel_connections table.
//!
//! The UI-facing connection-status record, kept separate from the secret
//! credential record it mirrors.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChannelConnections::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChannelConnections::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChannelConnections::UserId).text().not_null())
                    .col(
                        ColumnDef::new(ChannelConnections::Platform)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ChannelConnections::Connected)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ChannelConnections::Username).text().null())
                    .col(
                        ColumnDef::new(ChannelConnections::Profile)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ChannelConnections::ProfileWarning)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ChannelConnections::LastConnectedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ChannelConnections::LastDisconnectedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ChannelConnections::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ChannelConnections::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_channel_connections_user_id")
                            .from(ChannelConnections::Table, ChannelConnections::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_channel_connections_user_platform")
                    .table(ChannelConnections::Table)
                    .col(ChannelConnections::UserId)
                    .col(ChannelConnections::Platform)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_channel_connections_user_platform")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ChannelConnections::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ChannelConnections {
    Table,
    Id,
    UserId,
    Platform,
    Connected,
    Username,
    Profile,
    ProfileWarning,
    LastConnectedAt,
    LastDisconnectedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
