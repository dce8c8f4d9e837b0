//! Cron entry registry.
//!
//! Cron entries are registered once at load time and afterwards only their
//! `enabled` flag changes. Each change appends a row to `cron_entry_events`
//! in the same transaction, which is the observable toggle history.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AdminError;
use crate::models::cron_entry::{self, Column, Entity as CronEntry};
use crate::models::cron_entry_event::{self, Entity as CronEntryEvent};

/// Definition used to register a cron entry
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CronEntryDefinition {
    pub key: String,
    pub schedule: String,
    pub job_class: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub arguments: Option<JsonValue>,
    /// Initial flag; ignored when the entry already exists
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CronEntryView {
    pub key: String,
    pub schedule: String,
    pub job_class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub arguments: Option<JsonValue>,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<cron_entry::Model> for CronEntryView {
    fn from(model: cron_entry::Model) -> Self {
        Self {
            key: model.key,
            schedule: model.schedule,
            job_class: model.job_class,
            description: model.description,
            arguments: model.arguments,
            enabled: model.enabled,
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

/// One enabled-state change
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CronEntryEventView {
    pub id: Uuid,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<cron_entry_event::Model> for CronEntryEventView {
    fn from(model: cron_entry_event::Model) -> Self {
        Self {
            id: model.id,
            enabled: model.enabled,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

/// Repository for the cron entry registry
pub struct CronEntryRepository {
    db: DatabaseConnection,
}

impl CronEntryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// All entries ordered by key
    pub async fn list(&self) -> Result<Vec<cron_entry::Model>, AdminError> {
        Ok(CronEntry::find()
            .order_by_asc(Column::Key)
            .all(&self.db)
            .await?)
    }

    pub async fn find(&self, key: &str) -> Result<cron_entry::Model, AdminError> {
        CronEntry::find_by_id(key.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| AdminError::not_found("cron entry", key))
    }

    /// Read the flag fresh from the store; used by the external scheduler on
    /// every dispatch decision.
    pub async fn is_enabled(&self, key: &str) -> Result<bool, AdminError> {
        Ok(self.find(key).await?.enabled)
    }

    /// Flip `enabled` and record the change.
    pub async fn toggle(&self, key: &str) -> Result<cron_entry::Model, AdminError> {
        let txn = self.db.begin().await?;
        let now = Utc::now().fixed_offset();

        let entry = CronEntry::find_by_id(key.to_string())
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AdminError::not_found("cron entry", key))?;
        let enabled = !entry.enabled;

        let result = CronEntry::update_many()
            .col_expr(Column::Enabled, Expr::value(enabled))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Key.eq(key))
            .filter(Column::Enabled.eq(entry.enabled))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AdminError::conflict("cron entry", key));
        }

        cron_entry_event::ActiveModel {
            id: Set(Uuid::now_v7()),
            cron_key: Set(entry.key.clone()),
            enabled: Set(enabled),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        Ok(cron_entry::Model {
            enabled,
            updated_at: now,
            ..entry
        })
    }

    /// Enabled-state changes of one entry, oldest first
    pub async fn events(&self, key: &str) -> Result<Vec<cron_entry_event::Model>, AdminError> {
        self.find(key).await?;
        Ok(CronEntryEvent::find()
            .filter(cron_entry_event::Column::CronKey.eq(key))
            .order_by_asc(cron_entry_event::Column::CreatedAt)
            .order_by_asc(cron_entry_event::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// Insert the entry if its key is unknown. Returns `true` when inserted.
    /// Existing entries keep their `enabled` flag.
    pub async fn register(&self, definition: CronEntryDefinition) -> Result<bool, AdminError> {
        let key = definition.key.trim().to_string();
        if key.is_empty() {
            return Err(AdminError::invalid_state("cron entry key must not be empty"));
        }

        let txn = self.db.begin().await?;
        if CronEntry::find_by_id(key.clone())
            .one(&txn)
            .await?
            .is_some()
        {
            txn.commit().await?;
            return Ok(false);
        }

        let now = Utc::now().fixed_offset();
        cron_entry::ActiveModel {
            key: Set(key),
            schedule: Set(definition.schedule),
            job_class: Set(definition.job_class),
            description: Set(definition.description),
            arguments: Set(definition.arguments),
            enabled: Set(definition.enabled),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        Ok(true)
    }
}
