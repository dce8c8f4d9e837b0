//! Migration to create the cron_entries and cron_entry_events tables.
//!
//! `cron_entries` holds one row per named schedule with its enabled flag;
//! `cron_entry_events` records every enabled-state change made by operators.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CronEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CronEntries::Key)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CronEntries::Schedule).text().not_null())
                    .col(ColumnDef::new(CronEntries::JobClass).text().not_null())
                    .col(ColumnDef::new(CronEntries::Description).text().null())
                    .col(ColumnDef::new(CronEntries::Arguments).json_binary().null())
                    .col(
                        ColumnDef::new(CronEntries::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(CronEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CronEntries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CronEntryEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CronEntryEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CronEntryEvents::CronKey).text().not_null())
                    .col(ColumnDef::new(CronEntryEvents::Enabled).boolean().not_null())
                    .col(
                        ColumnDef::new(CronEntryEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cron_entry_events_cron_key")
                            .from(CronEntryEvents::Table, CronEntryEvents::CronKey)
                            .to(CronEntries::Table, CronEntries::Key)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cron_entry_events_key_created")
                    .table(CronEntryEvents::Table)
                    .col(CronEntryEvents::CronKey)
                    .col(CronEntryEvents::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_cron_entry_events_key_created")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(CronEntryEvents::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(CronEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CronEntries {
    Table,
    Key,
    Schedule,
    JobClass,
    Description,
    Arguments,
    Enabled,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CronEntryEvents {
    Table,
    Id,
    CronKey,
    Enabled,
    CreatedAt,
}
