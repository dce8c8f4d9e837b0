//! CronEntryEvent entity model
//!
//! One row per enabled-state change of a cron entry.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "cron_entry_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Key of the cron entry that changed
    pub cron_key: String,

    /// Value of `enabled` after the change
    pub enabled: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cron_entry::Entity",
        from = "Column::CronKey",
        to = "super::cron_entry::Column::Key"
    )]
    CronEntry,
}

impl Related<super::cron_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CronEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
