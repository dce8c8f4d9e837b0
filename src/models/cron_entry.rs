//! CronEntry entity model
//!
//! This module contains the SeaORM entity model for the cron_entries table,
//! which holds named, schedule-bound job templates and their enabled flag.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;

/// Cron entry keyed by its unique name
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cron_entries")]
pub struct Model {
    /// Unique key of the entry (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,

    /// Schedule descriptor, stored verbatim for the external scheduler
    pub schedule: String,

    /// Job class enqueued on every tick
    pub job_class: String,

    /// Optional operator-facing description
    pub description: Option<String>,

    /// Arguments handed to every enqueued job
    #[sea_orm(column_type = "JsonBinary")]
    pub arguments: Option<JsonValue>,

    /// Whether the external scheduler should dispatch this entry
    pub enabled: bool,

    /// Timestamp when the entry was registered
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp of the last change to the entry
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cron_entry_event::Entity")]
    Events,
}

impl Related<super::cron_entry_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
