//! Job entity model
//!
//! This module contains the SeaORM entity model for the jobs table. A job is
//! the logical unit of work; each attempt to run it is an execution row.

use super::execution::Entity as Execution;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Job entity representing one enqueued unit of work
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    /// Unique identifier for the job (UUIDv7, creation ordered)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Class name of the job, e.g. `ExampleJob`
    pub job_class: String,

    /// Queue the job was enqueued on
    pub queue_name: String,

    /// Opaque argument payload, searched as serialized JSON
    #[sea_orm(column_type = "JsonBinary")]
    pub arguments: JsonValue,

    /// Cron entry that enqueued this job, if any
    pub cron_key: Option<String>,

    /// Optimistic concurrency counter bumped on every execution mutation
    pub lock_version: i32,

    /// Timestamp when the job was enqueued
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp of the last mutation touching the job or its executions
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::execution::Entity")]
    Executions,
}

impl Related<Execution> for Entity {
    fn to() -> RelationDef {
        Relation::Executions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
