//! Test utilities for database testing.
//!
//! In-memory SQLite with migrations applied, plus helpers that drive jobs
//! into each status through the same transitions workers use.

#![allow(dead_code)]

use anyhow::Result;
use jobdesk::admin::AdminService;
use jobdesk::config::AppConfig;
use jobdesk::repositories::cron_entry::CronEntryDefinition;
use jobdesk::repositories::job::{JobAggregate, NewJob};
use jobdesk::repositories::{CronEntryRepository, ExecutionRepository, JobRepository};
use jobdesk::status::RetryPolicy;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::json;
use uuid::Uuid;

pub const DISCARD_MESSAGE: &str = "Discarded by operator";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Configuration for the `test` profile (auth disabled unless tokens are set).
pub fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        database_url: "sqlite::memory:".to_string(),
        ..AppConfig::default()
    }
}

pub fn admin_service(db: &DatabaseConnection, allow_succeeded: bool) -> AdminService {
    AdminService::new(
        db.clone(),
        RetryPolicy { allow_succeeded },
        DISCARD_MESSAGE.to_string(),
    )
}

pub async fn register_cron_entry(db: &DatabaseConnection, key: &str, enabled: bool) -> Result<()> {
    CronEntryRepository::new(db.clone())
        .register(CronEntryDefinition {
            key: key.to_string(),
            schedule: "*/5 * * * *".to_string(),
            job_class: "ExampleJob".to_string(),
            description: Some(format!("{} entry", key)),
            arguments: Some(json!({ "source": key })),
            enabled,
        })
        .await?;
    Ok(())
}

/// A job with a single pending execution.
pub async fn queued_job(db: &DatabaseConnection, arguments: serde_json::Value) -> Result<JobAggregate> {
    Ok(JobRepository::new(db.clone())
        .enqueue(NewJob::new("ExampleJob", arguments))
        .await?)
}

/// A job whose only execution has been picked up by a worker.
pub async fn running_job(db: &DatabaseConnection, arguments: serde_json::Value) -> Result<JobAggregate> {
    let job = queued_job(db, arguments).await?;
    let head = head_id(&job);
    ExecutionRepository::new(db.clone()).start(head).await?;
    reload(db, job.job.id).await
}

/// A job whose only execution finished successfully.
pub async fn succeeded_job(db: &DatabaseConnection, arguments: serde_json::Value) -> Result<JobAggregate> {
    let job = running_job(db, arguments).await?;
    ExecutionRepository::new(db.clone())
        .finish(head_id(&job), None)
        .await?;
    reload(db, job.job.id).await
}

/// A job whose only execution finished with an error.
pub async fn failed_job(db: &DatabaseConnection, arguments: serde_json::Value) -> Result<JobAggregate> {
    let job = running_job(db, arguments).await?;
    ExecutionRepository::new(db.clone())
        .finish(head_id(&job), Some("RuntimeError: boom".to_string()))
        .await?;
    reload(db, job.job.id).await
}

pub async fn reload(db: &DatabaseConnection, job_id: Uuid) -> Result<JobAggregate> {
    Ok(JobRepository::new(db.clone()).find(job_id).await?)
}

pub fn head_id(job: &JobAggregate) -> Uuid {
    job.head().map(|head| head.id).unwrap_or_else(Uuid::nil)
}
