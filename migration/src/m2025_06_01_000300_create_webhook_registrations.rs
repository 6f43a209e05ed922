//! Migration to create the webhook_registrations table.
//!
//! Records the automation-engine webhook URL registered for a connected
//! channel. This is registration of intent; the automation engine is not
//! consulted for confirmation.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WebhookRegistrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WebhookRegistrations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WebhookRegistrations::UserId)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WebhookRegistrations::Platform)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WebhookRegistrations::Url).text().not_null())
                    .col(
                        ColumnDef::new(WebhookRegistrations::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(WebhookRegistrations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(WebhookRegistrations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_webhook_registrations_user_id")
                            .from(WebhookRegistrations::Table, WebhookRegistrations::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_webhook_registrations_user_platform")
                    .table(WebhookRegistrations::Table)
                    .col(WebhookRegistrations::UserId)
                    .col(WebhookRegistrations::Platform)
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
                    .name("idx_webhook_registrations_user_platform")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(WebhookRegistrations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WebhookRegistrations {
    Table,
    Id,
    UserId,
    Platform,
    Url,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
