//! Migration to create the jobs table.
//!
//! A job is the logical unit of work; its attempts live in `executions`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Jobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Jobs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Jobs::JobClass).text().not_null())
                    .col(
                        ColumnDef::new(Jobs::QueueName)
                            .text()
                            .not_null()
                            .default("default"),
                    )
                    .col(ColumnDef::new(Jobs::Arguments).json_binary().not_null())
                    .col(ColumnDef::new(Jobs::CronKey).text().null())
                    .col(
                        ColumnDef::new(Jobs::LockVersion)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Jobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Jobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Listing walks jobs newest first with an id tie-break
        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_created_at_id")
                    .table(Jobs::Table)
                    .col(Jobs::CreatedAt)
                    .col(Jobs::Id)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_jobs_created_at_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Jobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Jobs {
    Table,
    Id,
    JobClass,
    QueueName,
    Arguments,
    CronKey,
    LockVersion,
    CreatedAt,
    UpdatedAt,
}
