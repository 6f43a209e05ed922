//! Migration to create the social_credentials table.
//!
//! Stores the per-user, per-platform OAuth credential record. Tokens are held
//! as AES-256-GCM ciphertext; a disconnect nulls the token columns and stamps
//! disconnected_at rather than deleting the row.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SocialCredentials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SocialCredentials::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SocialCredentials::UserId).text().not_null())
                    .col(
                        ColumnDef::new(SocialCredentials::Platform)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SocialCredentials::AccessTokenCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SocialCredentials::RefreshTokenCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SocialCredentials::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(SocialCredentials::Scope).text().null())
                    .col(ColumnDef::new(SocialCredentials::AccountId).text().null())
                    .col(
                        ColumnDef::new(SocialCredentials::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SocialCredentials::DisconnectedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SocialCredentials::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SocialCredentials::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_social_credentials_user_id")
                            .from(SocialCredentials::Table, SocialCredentials::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One credential record per (user, platform); reconnects merge into it
        manager
            .create_index(
                Index::create()
                    .name("idx_social_credentials_user_platform")
                    .table(SocialCredentials::Table)
                    .col(SocialCredentials::UserId)
                    .col(SocialCredentials::Platform)
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
                    .name("idx_social_credentials_user_platform")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(SocialCredentials::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SocialCredentials {
    Table,
    Id,
    UserId,
    Platform,
    AccessTokenCiphertext,
    RefreshTokenCiphertext,
    ExpiresAt,
    Scope,
    AccountId,
    LastSyncedAt,
    DisconnectedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
