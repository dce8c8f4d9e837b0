//! # Data Models
//!
//! SeaORM entities for cron entries, jobs and their executions.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod cron_entry;
pub mod cron_entry_event;
pub mod execution;
pub mod job;

pub use cron_entry::Entity as CronEntry;
pub use cron_entry_event::Entity as CronEntryEvent;
pub use execution::Entity as Execution;
pub use job::Entity as Job;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "jobdesk".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
