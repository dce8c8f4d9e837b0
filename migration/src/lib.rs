//! Database migrations for the jobdesk control plane.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_12_01_000100_create_cron_entries;
mod m2025_12_01_000200_create_jobs;
mod m2025_12_01_000300_create_executions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_12_01_000100_create_cron_entries::Migration),
            Box::new(m2025_12_01_000200_create_jobs::Migration),
            Box::new(m2025_12_01_000300_create_executions::Migration),
        ]
    }
}
