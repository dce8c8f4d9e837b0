//! Execution entity model
//!
//! This module contains the SeaORM entity model for the executions table.
//! An execution is a single attempt to run a job.

use super::job::Entity as Job;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Execution entity representing one attempt to run a job
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "executions")]
pub struct Model {
    /// Unique identifier (UUIDv7, doubles as creation sequence)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Job this execution belongs to
    pub job_id: Uuid,

    /// Timestamp when the execution becomes eligible to run
    pub scheduled_at: DateTimeWithTimeZone,

    /// Timestamp when a worker picked the execution up
    pub performed_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the execution reached a terminal state
    pub finished_at: Option<DateTimeWithTimeZone>,

    /// Error recorded when the execution failed or was discarded
    pub error: Option<String>,

    /// Timestamp when the execution row was created
    pub created_at: DateTimeWithTimeZone,

    /// Set when an operator deleted the execution; such rows are never read back
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Job",
        from = "Column::JobId",
        to = "super::job::Column::Id"
    )]
    Job,
}

impl Related<Job> for Entity {
    fn to() -> RelationDef {
        Relation::Job.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
