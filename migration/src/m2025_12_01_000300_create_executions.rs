//! Migration to create the executions table.
//!
//! Each row is one attempt to run a job. Rows are soft-deleted through
//! `deleted_at` so a repeated delete can be told apart from an unknown id.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Executions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Executions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Executions::JobId).uuid().not_null())
                    .col(
                        ColumnDef::new(Executions::ScheduledAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Executions::PerformedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Executions::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Executions::Error).text().null())
                    .col(
                        ColumnDef::new(Executions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Executions::DeletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_executions_job_id")
                            .from(Executions::Table, Executions::JobId)
                            .to(Jobs::Table, Jobs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Head resolution: newest scheduled_at per job, ties broken by id
        manager
            .create_index(
                Index::create()
                    .name("idx_executions_job_scheduled_id")
                    .table(Executions::Table)
                    .col(Executions::JobId)
                    .col(Executions::ScheduledAt)
                    .col(Executions::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_executions_created_at_id")
                    .table(Executions::Table)
                    .col(Executions::CreatedAt)
                    .col(Executions::Id)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_executions_job_scheduled_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_executions_created_at_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Executions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Executions {
    Table,
    Id,
    JobId,
    ScheduledAt,
    PerformedAt,
    FinishedAt,
    Error,
    CreatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum Jobs {
    Table,
    Id,
}
